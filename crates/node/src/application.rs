//! The running node: an inbound socket listener feeding a single worker that
//! owns the local store, plus a pattern-driven transaction generator.
//!
//! All state mutation happens on the worker task; the listener only decodes
//! frames and forwards them over a channel, which is the handoff fence the
//! proof lifecycle relies on.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use skein_ledger::{
    LocalStore, MockMainChain, Node, NodeId, Proof, ProofMessage, Transaction,
    TransactionPointer, TransactionSource,
};
use skein_net::{read_message, write_message, Message, PatternSpec, WireError};

use crate::config::NodeCfg;
use crate::metrics;
use crate::pattern::{self, TransactionPattern};
use crate::registry::StaticRegistry;

enum Command {
    Inbound(Message),
    GenerateTransaction,
}

pub struct Application {
    store: LocalStore,
    pattern: Option<Box<dyn TransactionPattern>>,
    rng: StdRng,
    /// The output this node spends next: its latest remainder.
    unspent: TransactionSource,
    spendable: u64,
}

impl Application {
    /// Wire everything up and run until the worker stops or ctrl-c.
    pub async fn run(
        cfg: NodeCfg,
        registry: StaticRegistry,
        initial_pattern: Option<PatternSpec>,
    ) -> anyhow::Result<()> {
        let own_info = registry
            .info(cfg.node_id)
            .cloned()
            .with_context(|| format!("node {} is not in the registry", cfg.node_id))?;

        let oracle = Arc::new(MockMainChain::new());
        let own = Node::with_genesis(
            cfg.node_id,
            own_info.address.clone(),
            own_info.port,
            cfg.genesis_amount,
        );
        let mut store = LocalStore::new(own, oracle, Box::new(registry.clone()));
        for info in registry.all() {
            if info.id != cfg.node_id {
                store.register_node(Node::new(info.id, info.address.clone(), info.port));
            }
        }

        // Anchor our genesis so receivers can verify spends from it.
        let genesis_abstract = store
            .node(cfg.node_id)
            .and_then(|n| n.chain.block(0))
            .map(|b| b.to_abstract())
            .context("own chain has no genesis block")?;
        store.main_chain().init();
        store.main_chain().commit_abstract(&genesis_abstract);
        if let Some(node) = store.node_mut(cfg.node_id) {
            node.chain.mark_committed(0)?;
        }

        let unspent = TransactionSource {
            owner: cfg.node_id,
            block_number: 0,
            id: 0,
        };
        let mut app = Application {
            store,
            pattern: initial_pattern.map(pattern::from_spec),
            rng: StdRng::from_entropy(),
            unspent,
            spendable: cfg.genesis_amount,
        };

        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        let listen: SocketAddr = cfg.listen.parse().context("invalid listen address")?;
        let listener = TcpListener::bind(listen)
            .await
            .with_context(|| format!("binding {listen}"))?;
        log::info!("node {} listening on {listen}", cfg.node_id);
        tokio::spawn(listen_loop(listener, cmd_tx.clone()));

        let metrics_listen: SocketAddr = cfg
            .metrics_listen
            .parse()
            .context("invalid metrics address")?;
        tokio::spawn(async move {
            if let Err(err) = metrics::serve(metrics_listen).await {
                log::warn!("metrics server stopped: {err}");
            }
        });

        app.schedule_next_tick(&cmd_tx);

        let result = tokio::select! {
            result = app.worker(cmd_rx, cmd_tx.clone()) => result,
            _ = tokio::signal::ctrl_c() => {
                log::info!("shutting down");
                Ok(())
            }
        };
        app.store.main_chain().stop();
        result
    }

    async fn worker(
        &mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        cmd_tx: mpsc::Sender<Command>,
    ) -> anyhow::Result<()> {
        while let Some(command) = cmd_rx.recv().await {
            match command {
                Command::Inbound(message) => self.handle_message(message, &cmd_tx),
                Command::GenerateTransaction => {
                    if let Err(err) = self.send_transaction().await {
                        log::warn!("transaction send failed: {err:#}");
                    }
                    self.schedule_next_tick(&cmd_tx);
                }
            }
        }
        Ok(())
    }

    fn handle_message(&mut self, message: Message, cmd_tx: &mpsc::Sender<Command>) {
        match message {
            Message::Proof(proof_message) => self.handle_proof(proof_message),
            Message::TransactionPattern(pattern_message) => {
                let pattern = pattern::from_spec(pattern_message.pattern);
                log::info!("installing transaction pattern {}", pattern.name());
                self.pattern = Some(pattern);
                self.schedule_next_tick(cmd_tx);
            }
            // Transactions and blocks only ever arrive wrapped in proofs.
            Message::Transaction(_) | Message::Block(_) => {
                log::debug!("ignoring standalone payload message");
            }
        }
    }

    /// Decode, verify, apply. A failure at any stage drops the proof and
    /// leaves local state untouched; the payload is never retried.
    fn handle_proof(&mut self, message: ProofMessage) {
        let proof = match Proof::decode(&message, &mut self.store) {
            Ok(proof) => proof,
            Err(err) => {
                metrics::PROOFS_REJECTED.inc();
                log::warn!("dropping undecodable proof: {err}");
                return;
            }
        };

        if let Err(err) = proof.verify(&self.store) {
            metrics::PROOFS_REJECTED.inc();
            log::warn!("rejecting proof of {:?}: {err}", proof.transaction());
            return;
        }

        let pointer = proof.transaction();
        let blocks = proof.number_of_blocks();
        match proof.apply_updates(&mut self.store) {
            Ok(()) => {
                metrics::PROOFS_VERIFIED.inc();
                metrics::BLOCKS_APPENDED.inc_by(blocks as u64);
                log::info!(
                    "applied proof of {}/{}/{} ({} blocks)",
                    pointer.sender,
                    pointer.block_number,
                    pointer.id,
                    blocks
                );
            }
            Err(err) => {
                metrics::PROOFS_REJECTED.inc();
                log::error!("verified proof failed to apply: {err}");
            }
        }
    }

    /// Seal a spend of our current remainder into a fresh block, anchor the
    /// block, build the proof for the chosen receiver and ship it. The
    /// receiver's meta-knowledge is credited only after the send succeeded.
    async fn send_transaction(&mut self) -> anyhow::Result<()> {
        let Some(pattern) = &self.pattern else {
            return Ok(());
        };
        let own_id = self.store.own_id();
        let peers: Vec<NodeId> = self.store.node_ids().collect();
        let Some(receiver) = pattern.pick_receiver(own_id, &peers, &mut self.rng) else {
            return Ok(());
        };
        if self.spendable == 0 {
            log::debug!("nothing left to spend");
            return Ok(());
        }

        let amount = (self.spendable / 2).max(1);
        let remainder = self.spendable - amount;
        let tx = Transaction::new(0, Some(own_id), receiver, amount, remainder, vec![self.unspent]);

        let block_number = self
            .store
            .node_mut(own_id)
            .context("own node")?
            .chain
            .seal_block(vec![tx]);
        let block_abstract = self
            .store
            .node(own_id)
            .and_then(|n| n.chain.block(block_number))
            .map(|b| b.to_abstract())
            .context("sealed block")?;
        self.store.main_chain().commit_abstract(&block_abstract);
        self.store
            .node_mut(own_id)
            .context("own node")?
            .chain
            .mark_committed(block_number)?;

        let pointer = TransactionPointer {
            sender: own_id,
            block_number,
            id: 0,
        };
        let proof = Proof::build(pointer, receiver, &self.store)?;
        let message = Message::Proof(proof.to_message(&self.store)?);

        let target = self
            .store
            .node(receiver)
            .map(|n| format!("{}:{}", n.address, n.port))
            .context("receiver is not registered")?;
        deliver(&target, &message).await?;

        let summary = proof.update_summary();
        if let Some(node) = self.store.node_mut(receiver) {
            node.meta_knowledge.absorb_all(&summary);
        }
        self.unspent = TransactionSource {
            owner: own_id,
            block_number,
            id: 0,
        };
        self.spendable = remainder;
        metrics::TRANSACTIONS_SENT.inc();
        log::info!(
            "sent {amount} to node {receiver} in block {block_number} ({} proof blocks)",
            proof.number_of_blocks()
        );
        Ok(())
    }

    fn schedule_next_tick(&mut self, cmd_tx: &mpsc::Sender<Command>) {
        let Some(pattern) = &self.pattern else {
            return;
        };
        let wait = pattern.next_wait(&mut self.rng);
        let cmd_tx = cmd_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let _ = cmd_tx.send(Command::GenerateTransaction).await;
        });
    }
}

async fn deliver(target: &str, message: &Message) -> anyhow::Result<()> {
    let mut stream = TcpStream::connect(target)
        .await
        .with_context(|| format!("connecting to {target}"))?;
    write_message(&mut stream, message).await?;
    Ok(())
}

async fn listen_loop(listener: TcpListener, cmd_tx: mpsc::Sender<Command>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tokio::spawn(connection_loop(stream, peer, cmd_tx.clone()));
            }
            Err(err) => log::warn!("accept failed: {err}"),
        }
    }
}

async fn connection_loop(
    mut stream: TcpStream,
    peer: SocketAddr,
    cmd_tx: mpsc::Sender<Command>,
) {
    loop {
        match read_message(&mut stream).await {
            Ok(message) => {
                if cmd_tx.send(Command::Inbound(message)).await.is_err() {
                    return; // worker is gone
                }
            }
            Err(WireError::Io(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                return; // clean close
            }
            Err(err) => {
                log::warn!("dropping connection from {peer}: {err}");
                return;
            }
        }
    }
}
