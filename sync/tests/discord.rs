//! Discord client behavior against canned HTTP responses.

use huntboard_sync::{DiscordApi, EntityKind, SyncError, TopologyApi};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve one canned HTTP response on a local port, then hang up.
async fn one_response(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn deleting_an_absent_channel_is_success() {
    let base = one_response("404 Not Found", r#"{"message":"Unknown Channel"}"#).await;
    let api = DiscordApi::with_base_url("bot-token", base);
    api.delete_entity("123").await.unwrap();
}

#[tokio::test]
async fn remote_errors_surface_status_and_message() {
    let base = one_response("403 Forbidden", r#"{"message":"Missing Access"}"#).await;
    let api = DiscordApi::with_base_url("bot-token", base);
    match api.delete_entity("123").await {
        Err(SyncError::Status { status, message }) => {
            assert_eq!(status, 403);
            assert_eq!(message, "Missing Access");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn listings_keep_only_categories_and_voice_channels() {
    let body = concat!(
        r#"[{"id":"1","name":"Round 1","type":4,"parent_id":null},"#,
        r#"{"id":"2","name":"Alpha","type":2,"parent_id":"1"},"#,
        r#"{"id":"3","name":"general","type":0,"parent_id":null}]"#
    );
    let base = one_response("200 OK", body).await;
    let api = DiscordApi::with_base_url("bot-token", base);

    let entities = api.list_entities("guild-1").await.unwrap();
    assert_eq!(entities.len(), 2);
    assert_eq!(entities[0].kind, EntityKind::Category);
    assert_eq!(entities[0].name, "Round 1");
    assert_eq!(entities[1].kind, EntityKind::Voice);
    assert_eq!(entities[1].parent_id.as_deref(), Some("1"));
}
