use skein_ledger::{ProofMessage, TransactionMessage};
use skein_net::{
    decode_envelope, encode_envelope, read_message, write_message, Message, PatternSpec,
    TransactionPatternMessage, WireError,
};

fn sample_proof_message() -> Message {
    Message::Proof(ProofMessage {
        transaction: TransactionMessage {
            number: 0,
            sender_id: Some(1),
            receiver_id: 2,
            amount: 400,
            remainder: 600,
            block_number: Some(1),
            sources: Vec::new(),
        },
        chain_updates: Default::default(),
    })
}

#[test]
fn envelope_round_trips() {
    let message = sample_proof_message();
    let envelope = encode_envelope(&message).expect("encodes");
    assert_eq!(envelope.kind, skein_net::wire::MSG_PROOF);
    assert_eq!(decode_envelope(&envelope).expect("decodes"), message);
}

#[test]
fn mislabelled_envelope_is_rejected() {
    let mut envelope = encode_envelope(&sample_proof_message()).expect("encodes");
    envelope.kind = skein_net::wire::MSG_BLOCK;
    let err = decode_envelope(&envelope).expect_err("kind mismatch");
    assert!(matches!(err, WireError::KindMismatch { .. }));
}

#[tokio::test]
async fn framed_messages_round_trip_over_a_duplex() {
    let (mut client, mut server) = tokio::io::duplex(64 * 1024);

    let pattern = Message::TransactionPattern(TransactionPatternMessage {
        pattern: PatternSpec::Uniform {
            min_wait_ms: 100,
            max_wait_ms: 500,
        },
    });
    let proof = sample_proof_message();

    write_message(&mut client, &pattern).await.expect("writes");
    write_message(&mut client, &proof).await.expect("writes");

    assert_eq!(read_message(&mut server).await.expect("reads"), pattern);
    assert_eq!(read_message(&mut server).await.expect("reads"), proof);
}

#[tokio::test]
async fn absurd_length_prefix_is_rejected_before_allocating() {
    let (mut client, mut server) = tokio::io::duplex(1024);
    tokio::io::AsyncWriteExt::write_all(&mut client, &u32::MAX.to_be_bytes())
        .await
        .expect("writes");

    let err = read_message(&mut server).await.expect_err("oversize");
    assert!(matches!(err, WireError::Oversize(_)));
}
