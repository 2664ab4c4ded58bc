use jiracache::channel::Channel;
use jiracache::client::Client;
use jiracache_protocol::{Push, ResultEntry};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader};

async fn read_request<R>(reader: &mut BufReader<R>) -> Value
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    serde_json::from_str(&line).unwrap()
}

#[tokio::test]
async fn out_of_order_responses_reach_their_callers() {
    let (ours, theirs) = tokio::io::duplex(4096);
    let client = Client::new(Channel::from_stream(ours));
    let (peer_read, mut peer_write) = tokio::io::split(theirs);
    let mut peer_read = BufReader::new(peer_read);

    let backend = tokio::spawn(async move {
        let first = read_request(&mut peer_read).await;
        let second = read_request(&mut peer_read).await;
        for req in [&second, &first] {
            let reply = match req["c"].as_str() {
                Some("query") => json!({"s": req["s"], "r": ["Q-1"]}),
                _ => json!({"s": req["s"], "r": {"key": req["key"], "fields": {"summary": "s"}}}),
            };
            peer_write
                .write_all(format!("{reply}\n").as_bytes())
                .await
                .unwrap();
        }
        (peer_read, peer_write)
    });

    let (results, issue) = tokio::join!(client.query("q"), client.get("G-1"));
    assert_eq!(results.unwrap(), vec![ResultEntry::Ref("Q-1".to_owned())]);
    let issue = issue.unwrap().unwrap();
    assert_eq!(issue.key, "G-1");
    assert_eq!(issue.summary(), Some("s"));

    backend.await.unwrap();
}

#[tokio::test]
async fn pushes_are_forwarded_and_unknown_seq_ignored() {
    let (ours, theirs) = tokio::io::duplex(4096);
    let mut client = Client::new(Channel::from_stream(ours));
    let (_peer_read, mut peer_write) = tokio::io::split(theirs);

    peer_write
        .write_all(b"{\"s\":99,\"r\":[]}\n{\"c\":\"updateraw\",\"i\":{\"key\":\"P-1\",\"fields\":{}}}\n")
        .await
        .unwrap();

    match client.next_push().await {
        Some(Push::UpdateRaw(issue)) => assert_eq!(issue.key, "P-1"),
        other => panic!("unexpected push: {other:?}"),
    }
}

#[tokio::test]
async fn null_get_response_is_none() {
    let (ours, theirs) = tokio::io::duplex(4096);
    let client = Client::new(Channel::from_stream(ours));
    let (peer_read, mut peer_write) = tokio::io::split(theirs);
    let mut peer_read = BufReader::new(peer_read);

    let backend = tokio::spawn(async move {
        let req = read_request(&mut peer_read).await;
        peer_write
            .write_all(format!("{}\n", json!({"s": req["s"], "r": null})).as_bytes())
            .await
            .unwrap();
        (peer_read, peer_write)
    });

    assert_eq!(client.get("NOPE-1").await.unwrap(), None);
    backend.await.unwrap();
}

#[tokio::test]
async fn closed_connection_fails_pending_request() {
    let (ours, theirs) = tokio::io::duplex(4096);
    let client = Client::new(Channel::from_stream(ours));
    let (peer_read, peer_write) = tokio::io::split(theirs);
    let mut peer_read = BufReader::new(peer_read);

    let backend = tokio::spawn(async move {
        let _ = read_request(&mut peer_read).await;
        drop(peer_write);
        drop(peer_read);
    });

    let err = client.query("q").await.unwrap_err();
    assert!(err.to_string().contains("connection closed"));
    backend.await.unwrap();
}
