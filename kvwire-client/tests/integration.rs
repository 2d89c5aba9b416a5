//! End-to-end tests against a scripted TCP server.

use kvwire_client::{Client, ClientConfig, ClientError};
use kvwire_protocol::Frame;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn read_frame(stream: &mut TcpStream) -> Option<(u8, Value)> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await.ok()?;
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await.ok()?;
    let value = if body.len() > 1 {
        serde_json::from_slice(&body[1..]).unwrap()
    } else {
        json!({})
    };
    Some((body[0], value))
}

async fn write_frame(stream: &mut TcpStream, code: u8, value: &Value) {
    let payload = serde_json::to_vec(value).unwrap();
    let bytes = Frame::new(code, payload.into()).encode().unwrap();
    stream.write_all(&bytes).await.unwrap();
}

/// Starts a fake server that answers ping, get, and list-keys requests.
/// Returns the client config pointing at it.
async fn start_server() -> ClientConfig {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                while let Some((code, params)) = read_frame(&mut stream).await {
                    match code {
                        // ping
                        1 => write_frame(&mut stream, 2, &json!({})).await,
                        // get
                        9 => {
                            let key = params["key"].as_str().unwrap_or("");
                            write_frame(&mut stream, 10, &json!({"value": format!("v-{key}")}))
                                .await;
                        }
                        // list keys: two pages, then a terminal frame
                        17 => {
                            write_frame(&mut stream, 18, &json!({"keys": ["a", "b"]})).await;
                            write_frame(&mut stream, 18, &json!({"keys": ["c"]})).await;
                            write_frame(&mut stream, 18, &json!({"done": true})).await;
                        }
                        _ => {
                            write_frame(
                                &mut stream,
                                0,
                                &json!({"errmsg": "unsupported", "errcode": 1}),
                            )
                            .await;
                        }
                    }
                }
            });
        }
    });

    ClientConfig::default().with_host("127.0.0.1").with_port(port)
}

#[tokio::test]
async fn test_lazy_connect_and_ping() {
    let config = start_server().await;
    let client = Client::new(config);

    // No explicit connect: the first request connects.
    client.ping().await.unwrap();
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_get_roundtrip() {
    let config = start_server().await;
    let client = Client::new(config);

    let result = client.get(json!({"bucket": "b", "key": "k1"})).await.unwrap();
    assert_eq!(result, json!({"value": "v-k1"}));
}

#[tokio::test]
async fn test_sequential_requests_in_order() {
    let config = start_server().await;
    let client = Client::new(config);

    for key in ["a", "b", "c"] {
        let result = client.get(json!({"key": key})).await.unwrap();
        assert_eq!(result, json!({"value": format!("v-{key}")}));
    }
}

#[tokio::test]
async fn test_list_keys_merged() {
    let config = start_server().await;
    let client = Client::new(config);

    let result = client.list_keys(json!({"bucket": "b"})).await.unwrap();
    assert_eq!(result, json!({"keys": ["a", "b", "c"]}));
}

#[tokio::test]
async fn test_list_keys_streamed() {
    let config = start_server().await;
    let client = Client::new(config);

    let stream = client.list_keys_stream(json!({"bucket": "b"})).unwrap();
    let pages = stream.collect().await.unwrap();
    assert_eq!(pages, vec![json!({"keys": ["a", "b"]}), json!({"keys": ["c"]})]);
}

#[tokio::test]
async fn test_server_error_is_typed() {
    let config = start_server().await;
    let client = Client::new(config);

    let result = client.search(json!({"q": "x"})).await;
    match result {
        Err(ClientError::Server { code, message }) => {
            assert_eq!(code, 1);
            assert_eq!(message, "unsupported");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_explicit_connect_and_disconnect() {
    let config = start_server().await.with_auto_connect(false);
    let client = Client::new(config);

    // Auto-connect disabled: requests fail until connect() is called.
    assert!(matches!(
        client.ping().await,
        Err(ClientError::NotConnected)
    ));

    client.connect().await.unwrap();
    assert!(client.is_connected());
    client.ping().await.unwrap();

    client.disconnect().await.unwrap();
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_connect_refused() {
    // Bind and drop a listener to get a port with nothing on it.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = Client::new(ClientConfig::default().with_port(port));
    let result = client.connect().await;
    assert!(matches!(result, Err(ClientError::Io(_))));
    assert!(!client.is_connected());
}
