// Mailgun delivery client
// One form-encoded POST per message, Basic auth, no retries

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;

use super::{MailError, Mailer, OutboundMessage};
use crate::config::MailConfig;
use crate::logger;

pub struct MailgunClient {
    config: MailConfig,
    authorization: String,
    http_client: reqwest::Client,
}

impl MailgunClient {
    pub fn new(config: MailConfig) -> Result<Self, MailError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;
        if config.api_key.is_empty() {
            logger::log_warning("mail.api_key is empty, delivery calls will be rejected upstream");
        }
        Ok(Self {
            authorization: basic_authorization(&config.api_key),
            config,
            http_client,
        })
    }
}

/// `Basic <base64(credential)>`; the credential is expected as `user:key`
fn basic_authorization(credential: &str) -> String {
    format!("Basic {}", STANDARD.encode(credential))
}

/// Build the URL-encoded request body for one message
fn encode_form(config: &MailConfig, message: &OutboundMessage) -> String {
    let subject = format!("{} {}", config.subject_prefix, message.title);

    let mut form = form_urlencoded::Serializer::new(String::new());
    form.append_pair("from", &config.from)
        .append_pair("to", &message.to)
        .append_pair("subject", &subject)
        .append_pair("template", &config.template)
        .append_pair("v:title", &message.title)
        .append_pair("v:message", &message.message)
        .append_pair("v:name", &message.name)
        .append_pair("v:contact", &message.contact)
        .append_pair("v:ip", &message.sender_ip);

    if config.include_reply_to {
        if let Some(reply_to) = &message.reply_to {
            form.append_pair("h:Reply-To", reply_to);
        }
    }

    form.finish()
}

#[async_trait]
impl Mailer for MailgunClient {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), MailError> {
        let response = self
            .http_client
            .post(&self.config.endpoint)
            .header(AUTHORIZATION, &self.authorization)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(encode_form(&self.config, message))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            logger::log_info(&format!(
                "[Mail] Delivered message for {} ({status})",
                message.to
            ));
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(MailError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn test_config() -> MailConfig {
        MailConfig {
            endpoint: "http://127.0.0.1:9/messages".to_string(),
            from: "contact@mg.example".to_string(),
            template: "contact-message".to_string(),
            subject_prefix: "Message from website".to_string(),
            api_key: "api:key-123".to_string(),
            timeout: 5,
            include_reply_to: false,
        }
    }

    fn test_message() -> OutboundMessage {
        OutboundMessage {
            to: "sales@co.example".to_string(),
            title: "Hello & welcome".to_string(),
            message: "Line one\nprice=5".to_string(),
            name: "Alice".to_string(),
            contact: "alice@example.com".to_string(),
            sender_ip: "1.2.3.4".to_string(),
            reply_to: Some("alice@example.com".to_string()),
        }
    }

    fn decode(body: &str) -> HashMap<String, String> {
        form_urlencoded::parse(body.as_bytes()).into_owned().collect()
    }

    #[test]
    fn test_basic_authorization() {
        assert_eq!(basic_authorization("api:key-123"), "Basic YXBpOmtleS0xMjM=");
    }

    #[test]
    fn test_form_fields() {
        let fields = decode(&encode_form(&test_config(), &test_message()));
        assert_eq!(fields["from"], "contact@mg.example");
        assert_eq!(fields["to"], "sales@co.example");
        assert_eq!(fields["subject"], "Message from website Hello & welcome");
        assert_eq!(fields["template"], "contact-message");
        assert_eq!(fields["v:title"], "Hello & welcome");
        assert_eq!(fields["v:message"], "Line one\nprice=5");
        assert_eq!(fields["v:name"], "Alice");
        assert_eq!(fields["v:contact"], "alice@example.com");
        assert_eq!(fields["v:ip"], "1.2.3.4");
        assert!(!fields.contains_key("h:Reply-To"));
    }

    #[test]
    fn test_reply_to_when_enabled() {
        let mut config = test_config();
        config.include_reply_to = true;
        let fields = decode(&encode_form(&config, &test_message()));
        assert_eq!(fields["h:Reply-To"], "alice@example.com");

        let mut message = test_message();
        message.reply_to = None;
        let fields = decode(&encode_form(&config, &message));
        assert!(!fields.contains_key("h:Reply-To"));
    }

    #[test]
    fn test_values_are_escaped() {
        let body = encode_form(&test_config(), &test_message());
        // A raw '&' inside a value would split the field
        assert!(!body.contains("Hello & welcome"));
        assert_eq!(decode(&body).len(), 9);
    }

    /// Accept one request, answer with `status` and `reply`, return the raw request
    async fn stub_server(status: &'static str, reply: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!(
            "http://{}/v3/mg.example/messages",
            listener.local_addr().unwrap()
        );

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request_complete(&request) {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
                reply.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8(request).unwrap()
        });

        (endpoint, handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = header(&text[..head_end], "content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        raw.len() >= head_end + 4 + length
    }

    fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
        head.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }

    fn split_request(raw: &str) -> (&str, &str) {
        raw.split_once("\r\n\r\n").unwrap()
    }

    #[tokio::test]
    async fn test_deliver_posts_form_with_basic_auth() {
        let (endpoint, server) = stub_server("200 OK", r#"{"message":"Queued"}"#).await;
        let client = MailgunClient::new(MailConfig {
            endpoint,
            ..test_config()
        })
        .unwrap();

        client.deliver(&test_message()).await.unwrap();

        let raw = server.await.unwrap();
        let (head, body) = split_request(&raw);
        assert!(head.starts_with("POST /v3/mg.example/messages HTTP/1.1\r\n"));
        assert_eq!(header(head, "authorization"), Some("Basic YXBpOmtleS0xMjM="));
        assert_eq!(
            header(head, "content-type"),
            Some("application/x-www-form-urlencoded")
        );

        let fields = decode(body);
        assert_eq!(fields["to"], "sales@co.example");
        assert_eq!(fields["subject"], "Message from website Hello & welcome");
        assert_eq!(fields["v:name"], "Alice");
        assert_eq!(fields["v:ip"], "1.2.3.4");
    }

    #[tokio::test]
    async fn test_deliver_rejected_status_is_error() {
        let (endpoint, server) = stub_server("401 Unauthorized", "Forbidden").await;
        let client = MailgunClient::new(MailConfig {
            endpoint,
            ..test_config()
        })
        .unwrap();

        let err = client.deliver(&test_message()).await.unwrap_err();
        assert!(matches!(
            &err,
            MailError::Status { status: 401, body } if body == "Forbidden"
        ));
        assert_eq!(
            crate::error::RelayError::from(err).status(),
            hyper::StatusCode::BAD_GATEWAY
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_deliver_unreachable_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/messages", listener.local_addr().unwrap());
        drop(listener);

        let client = MailgunClient::new(MailConfig {
            endpoint,
            ..test_config()
        })
        .unwrap();
        assert!(matches!(
            client.deliver(&test_message()).await,
            Err(MailError::Transport(_))
        ));
    }
}
