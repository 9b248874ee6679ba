//! `tokio-tungstenite` transport

use super::{Connector, Outbound, TransportEvent, TransportLink, TransportOptions, TransportPeer};
use futures::{SinkExt, StreamExt};
use ledgerlink_core::Error;
use std::collections::HashMap;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;

/// Opens real WebSocket connections, one task per link
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    fn open(&self, endpoint: &str, options: &TransportOptions) -> TransportLink {
        let (link, peer) = TransportLink::pair();
        let request = build_request(endpoint, &options.headers);
        tokio::spawn(run_link(endpoint.to_string(), request, peer));
        link
    }
}

fn build_request(endpoint: &str, headers: &HashMap<String, String>) -> Result<Request, String> {
    let mut request = endpoint
        .into_client_request()
        .map_err(|e| e.to_string())?;
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| e.to_string())?;
        let value = HeaderValue::from_str(value).map_err(|e| e.to_string())?;
        request.headers_mut().insert(name, value);
    }
    Ok(request)
}

fn fail(peer: &TransportPeer, reason: String) {
    peer.emit(TransportEvent::Error(Error::WebSocket(reason.clone())));
    peer.emit(TransportEvent::Closed { code: None, reason });
}

/// Resolves once the owning link asks to close or is dropped
async fn close_requested(peer: &mut TransportPeer) {
    while let Some(frame) = peer.next_outbound().await {
        if frame == Outbound::Close {
            return;
        }
    }
}

async fn run_link(endpoint: String, request: Result<Request, String>, mut peer: TransportPeer) {
    let request = match request {
        Ok(request) => request,
        Err(reason) => {
            tracing::warn!(endpoint = %endpoint, error = %reason, "invalid upgrade request");
            fail(&peer, reason);
            return;
        }
    };

    // A close while still connecting aborts the attempt; this is what bounds
    // DNS and TLS handshake hangs.
    let ws_stream = tokio::select! {
        result = connect_async(request) => match result {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                tracing::debug!(endpoint = %endpoint, error = %e, "connect failed");
                fail(&peer, e.to_string());
                return;
            }
        },
        _ = close_requested(&mut peer) => {
            tracing::debug!(endpoint = %endpoint, "connect aborted");
            peer.emit(TransportEvent::Closed {
                code: None,
                reason: "connect aborted".to_string(),
            });
            return;
        }
    };

    if !peer.emit(TransportEvent::Open) {
        return;
    }

    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if !peer.emit(TransportEvent::Message(text)) {
                        let _ = sink.send(Message::Close(None)).await;
                        return;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.into_owned()),
                        None => (None, String::new()),
                    };
                    peer.emit(TransportEvent::Closed { code, reason });
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    fail(&peer, e.to_string());
                    return;
                }
                None => {
                    peer.emit(TransportEvent::Closed {
                        code: None,
                        reason: "stream ended".to_string(),
                    });
                    return;
                }
            },
            outbound = peer.next_outbound() => match outbound {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        fail(&peer, e.to_string());
                        return;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    peer.emit(TransportEvent::Closed {
                        code: Some(1000),
                        reason: "closed by client".to_string(),
                    });
                    return;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_applies_headers() {
        let mut headers = HashMap::new();
        headers.insert("x-api-key".to_string(), "secret".to_string());
        let request = build_request("wss://node.example:51233", &headers).unwrap();
        assert_eq!(request.headers()["x-api-key"], "secret");
        assert_eq!(request.uri().host(), Some("node.example"));
    }

    #[test]
    fn test_build_request_rejects_bad_header() {
        let mut headers = HashMap::new();
        headers.insert("bad header".to_string(), "x".to_string());
        assert!(build_request("ws://localhost:1", &headers).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_closes_link() {
        let mut link = TungsteniteConnector.open("ws://127.0.0.1:1", &TransportOptions::default());
        match link.next_event().await {
            TransportEvent::Error(error) => {
                assert!(matches!(error, Error::WebSocket(_)));
                assert!(error.to_string().starts_with("WebSocket error: "));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(link.next_event().await, TransportEvent::Closed { code: None, .. }));
    }

    #[tokio::test]
    async fn test_invalid_upgrade_request_reports_websocket_error() {
        let mut headers = HashMap::new();
        headers.insert("bad header".to_string(), "x".to_string());
        let options = TransportOptions { headers };
        let mut link = TungsteniteConnector.open("ws://127.0.0.1:1", &options);
        match link.next_event().await {
            TransportEvent::Error(Error::WebSocket(reason)) => assert!(!reason.is_empty()),
            other => panic!("unexpected event {other:?}"),
        }
        match link.next_event().await {
            TransportEvent::Closed { reason, .. } => assert!(!reason.is_empty()),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
