//! `/send` handler
//!
//! Validates a contact-form submission, checks the sender against the
//! blocklist, resolves the recipient alias and hands the message to the mailer.

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::CONTENT_TYPE;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;

use crate::config::AppState;
use crate::error::RelayError;
use crate::http;
use crate::logger;
use crate::mail::OutboundMessage;
use crate::store::BAN;

pub const CONNECTING_IP_HEADER: &str = "cf-connecting-ip";
pub const OVERRIDE_IP_HEADER: &str = "override-connecting-ip";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data";

/// How the submitted body is encoded
#[derive(Debug, Clone, PartialEq, Eq)]
enum FormEncoding {
    UrlEncoded,
    Multipart { boundary: String },
}

/// Raw form fields; the first occurrence of a repeated field wins
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ContactForm {
    pub name: Option<String>,
    pub contact: Option<String>,
    pub body: Option<String>,
    pub subject: Option<String>,
    pub to: Option<String>,
}

impl ContactForm {
    pub fn parse(input: &[u8]) -> Self {
        let mut form = Self::default();
        for (key, value) in form_urlencoded::parse(input) {
            form.offer(&key, value.into_owned());
        }
        form
    }

    /// Parse a `multipart/form-data` body; file parts are read as text
    pub async fn parse_multipart(input: Bytes, boundary: &str) -> Result<Self, RelayError> {
        let stream = futures_util::stream::once(async move { Ok::<_, Infallible>(input) });
        let mut multipart = multer::Multipart::new(stream, boundary);

        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(ToString::to_string) else {
                continue;
            };
            let value = field.text().await.map_err(multipart_error)?;
            form.offer(&name, value);
        }
        Ok(form)
    }

    /// Record a field value unless the field was already seen
    fn offer(&mut self, key: &str, value: String) {
        let field = match key {
            "name" => &mut self.name,
            "contact" => &mut self.contact,
            "body" => &mut self.body,
            "subject" => &mut self.subject,
            "to" => &mut self.to,
            _ => return,
        };
        if field.is_none() {
            *field = Some(value);
        }
    }

    /// Subject if submitted (even empty), else the sender name
    pub fn title(&self) -> Option<&str> {
        self.subject.as_deref().or(self.name.as_deref())
    }
}

/// A validated submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub sender_ip: String,
    pub name: String,
    pub contact: String,
    pub title: String,
    pub body: String,
    /// Recipient alias, resolved through the allowlist
    pub to: String,
    pub reply_to: Option<String>,
}

impl SendRequest {
    /// All fields must be present and non-empty
    pub fn validate(sender_ip: Option<&str>, form: &ContactForm) -> Result<Self, RelayError> {
        let required = |value: Option<&str>| {
            value
                .filter(|v| !v.is_empty())
                .map(ToString::to_string)
                .ok_or(RelayError::MissingData)
        };

        let contact = required(form.contact.as_deref())?;
        Ok(Self {
            sender_ip: required(sender_ip)?,
            name: required(form.name.as_deref())?,
            title: required(form.title())?,
            body: required(form.body.as_deref())?,
            to: required(form.to.as_deref())?,
            reply_to: contact.contains('@').then(|| contact.clone()),
            contact,
        })
    }

    fn into_message(self, destination: String) -> OutboundMessage {
        OutboundMessage {
            to: destination,
            title: self.title,
            message: self.body,
            name: self.name,
            contact: self.contact,
            sender_ip: self.sender_ip,
            reply_to: self.reply_to,
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

/// Override header wins over the connecting-IP header, even when empty
fn effective_sender_ip(
    headers: &HeaderMap,
    peer_addr: Option<SocketAddr>,
    peer_ip_fallback: bool,
) -> Option<String> {
    let origin_ip = header_value(headers, CONNECTING_IP_HEADER);
    let override_ip = header_value(headers, OVERRIDE_IP_HEADER);

    logger::log_debug(&format!("Origin IP: {origin_ip:?}"));
    logger::log_debug(&format!("Override IP: {override_ip:?}"));
    if let Some(ip) = &override_ip {
        logger::log_info(&format!("Overriding IP {ip}"));
    }

    override_ip.or(origin_ip).or_else(|| {
        peer_addr
            .filter(|_| peer_ip_fallback)
            .map(|addr| addr.ip().to_string())
    })
}

fn multipart_error(e: multer::Error) -> RelayError {
    RelayError::BadBody(e.to_string())
}

/// Url-encoded and multipart forms are accepted; a missing content type is
/// read as url-encoded
fn form_encoding(headers: &HeaderMap) -> Result<FormEncoding, RelayError> {
    let Some(value) = headers.get(CONTENT_TYPE) else {
        return Ok(FormEncoding::UrlEncoded);
    };
    let value = value.to_str().unwrap_or_default();
    let essence = value.split(';').next().unwrap_or_default().trim();

    if essence.eq_ignore_ascii_case(FORM_CONTENT_TYPE) {
        Ok(FormEncoding::UrlEncoded)
    } else if essence.eq_ignore_ascii_case(MULTIPART_CONTENT_TYPE) {
        let boundary = multer::parse_boundary(value).map_err(multipart_error)?;
        Ok(FormEncoding::Multipart { boundary })
    } else {
        Err(RelayError::UnsupportedMediaType(value.to_string()))
    }
}

/// Collect the request body, failing once it grows past `limit` bytes
async fn read_body<B>(body: B, limit: u64) -> Result<Bytes, RelayError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let max = usize::try_from(limit).unwrap_or(usize::MAX);
    match Limited::new(body, max).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(RelayError::PayloadTooLarge(limit)),
        Err(e) => Err(RelayError::BadBody(e.to_string())),
    }
}

pub async fn handle_send<B>(
    req: Request<B>,
    state: &AppState,
    peer_addr: Option<SocketAddr>,
) -> Result<Response<Full<Bytes>>, RelayError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if req.method() != Method::POST {
        return Ok(http::build_405_response("POST"));
    }

    let (parts, body) = req.into_parts();
    let sender_ip =
        effective_sender_ip(&parts.headers, peer_addr, state.config.http.peer_ip_fallback);

    let encoding = form_encoding(&parts.headers)?;
    let body = read_body(body, state.config.http.max_body_size).await?;
    let form = match encoding {
        FormEncoding::UrlEncoded => ContactForm::parse(&body),
        FormEncoding::Multipart { boundary } => {
            ContactForm::parse_multipart(body, &boundary).await?
        }
    };

    logger::log_debug(&format!("Sender contact: {:?}", form.contact));
    logger::log_debug(&format!("Message body: {:?}", form.body));
    logger::log_debug(&format!("Message title: {:?}", form.title()));
    logger::log_debug(&format!("Selected recipient: {:?}", form.to));

    let request = SendRequest::validate(sender_ip.as_deref(), &form)?;
    logger::log_debug(&format!("Reply-to: {:?}", request.reply_to));

    let destination = state
        .allowlist
        .get(&request.to)
        .await?
        .filter(|address| !address.is_empty())
        .ok_or_else(|| RelayError::UnresolvedRecipient(request.to.clone()))?;

    let is_banned = state.blocklist.get(&request.sender_ip).await?.as_deref() == Some(BAN);
    if is_banned {
        return Err(RelayError::Banned(request.sender_ip));
    }

    let message = request.into_message(destination);
    state.mailer.deliver(&message).await?;

    Ok(http::build_text_response(StatusCode::OK, "Message sent"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_form() -> ContactForm {
        ContactForm::parse(b"name=Alice&contact=alice%40example.com&body=Hi&to=sales")
    }

    #[test]
    fn test_parse_form() {
        let form = ContactForm::parse(b"name=Alice+B&body=a%26b&to=sales&to=other&extra=1");
        assert_eq!(form.name.as_deref(), Some("Alice B"));
        assert_eq!(form.body.as_deref(), Some("a&b"));
        assert_eq!(form.to.as_deref(), Some("sales"));
        assert_eq!(form.contact, None);
        assert_eq!(form.subject, None);
    }

    #[test]
    fn test_title_defaults_to_name() {
        let form = complete_form();
        assert_eq!(form.title(), Some("Alice"));

        let form = ContactForm::parse(b"name=Alice&subject=Quote");
        assert_eq!(form.title(), Some("Quote"));

        // An empty subject is kept and later fails validation
        let form = ContactForm::parse(b"name=Alice&subject=");
        assert_eq!(form.title(), Some(""));
    }

    #[test]
    fn test_validate_complete() {
        let request = SendRequest::validate(Some("1.2.3.4"), &complete_form()).unwrap();
        assert_eq!(request.sender_ip, "1.2.3.4");
        assert_eq!(request.title, "Alice");
        assert_eq!(request.reply_to.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn test_reply_to_requires_at_sign() {
        let form = ContactForm::parse(b"name=Bob&contact=%2B44123456&body=Hi&to=sales");
        let request = SendRequest::validate(Some("1.2.3.4"), &form).unwrap();
        assert_eq!(request.reply_to, None);
    }

    #[test]
    fn test_validate_missing_fields() {
        assert!(matches!(
            SendRequest::validate(None, &complete_form()),
            Err(RelayError::MissingData)
        ));
        assert!(matches!(
            SendRequest::validate(Some(""), &complete_form()),
            Err(RelayError::MissingData)
        ));

        let incomplete: [&[u8]; 5] = [
            b"contact=a%40b.c&body=Hi&to=sales",
            b"name=Alice&body=Hi&to=sales",
            b"name=Alice&contact=a%40b.c&to=sales",
            b"name=Alice&contact=a%40b.c&body=Hi",
            b"name=Alice&contact=a%40b.c&body=Hi&to=sales&subject=",
        ];
        for body in incomplete {
            let form = ContactForm::parse(body);
            assert!(
                matches!(
                    SendRequest::validate(Some("1.2.3.4"), &form),
                    Err(RelayError::MissingData)
                ),
                "expected missing data for {}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn test_override_ip_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTING_IP_HEADER, "1.2.3.4".parse().unwrap());
        assert_eq!(
            effective_sender_ip(&headers, None, false).as_deref(),
            Some("1.2.3.4")
        );

        headers.insert(OVERRIDE_IP_HEADER, "5.6.7.8".parse().unwrap());
        assert_eq!(
            effective_sender_ip(&headers, None, false).as_deref(),
            Some("5.6.7.8")
        );
    }

    #[test]
    fn test_peer_fallback_is_opt_in() {
        let headers = HeaderMap::new();
        let peer = Some("10.1.1.1:4000".parse().unwrap());
        assert_eq!(effective_sender_ip(&headers, peer, false), None);
        assert_eq!(
            effective_sender_ip(&headers, peer, true).as_deref(),
            Some("10.1.1.1")
        );
    }

    #[test]
    fn test_form_encoding() {
        let mut headers = HeaderMap::new();
        assert_eq!(form_encoding(&headers).unwrap(), FormEncoding::UrlEncoded);

        headers.insert(
            CONTENT_TYPE,
            "application/x-www-form-urlencoded; charset=UTF-8".parse().unwrap(),
        );
        assert_eq!(form_encoding(&headers).unwrap(), FormEncoding::UrlEncoded);

        headers.insert(
            CONTENT_TYPE,
            "multipart/form-data; boundary=----relay42".parse().unwrap(),
        );
        assert_eq!(
            form_encoding(&headers).unwrap(),
            FormEncoding::Multipart {
                boundary: "----relay42".to_string()
            }
        );

        headers.insert(CONTENT_TYPE, "multipart/form-data".parse().unwrap());
        assert!(matches!(
            form_encoding(&headers),
            Err(RelayError::BadBody(_))
        ));

        headers.insert(CONTENT_TYPE, "application/json".parse().unwrap());
        assert!(matches!(
            form_encoding(&headers),
            Err(RelayError::UnsupportedMediaType(_))
        ));
    }

    #[tokio::test]
    async fn test_parse_multipart_first_value_wins() {
        let body = concat!(
            "--XyZ\r\n",
            "Content-Disposition: form-data; name=\"name\"\r\n\r\n",
            "Alice\r\n",
            "--XyZ\r\n",
            "Content-Disposition: form-data; name=\"to\"\r\n\r\n",
            "sales\r\n",
            "--XyZ\r\n",
            "Content-Disposition: form-data; name=\"to\"\r\n\r\n",
            "other\r\n",
            "--XyZ\r\n",
            "Content-Disposition: form-data; name=\"body\"\r\n\r\n",
            "a & b = c\r\n",
            "--XyZ\r\n",
            "Content-Disposition: form-data; name=\"extra\"\r\n\r\n",
            "ignored\r\n",
            "--XyZ--\r\n",
        );

        let form = ContactForm::parse_multipart(Bytes::from_static(body.as_bytes()), "XyZ")
            .await
            .unwrap();
        assert_eq!(form.name.as_deref(), Some("Alice"));
        assert_eq!(form.to.as_deref(), Some("sales"));
        assert_eq!(form.body.as_deref(), Some("a & b = c"));
        assert_eq!(form.contact, None);
    }

    #[tokio::test]
    async fn test_parse_multipart_truncated_is_bad_body() {
        let body = "--XyZ\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nAli";
        assert!(matches!(
            ContactForm::parse_multipart(Bytes::from_static(body.as_bytes()), "XyZ").await,
            Err(RelayError::BadBody(_))
        ));
    }

    #[tokio::test]
    async fn test_read_body_limit() {
        let body = Full::new(Bytes::from_static(b"name=Alice"));
        assert_eq!(read_body(body, 64).await.unwrap(), "name=Alice");

        let body = Full::new(Bytes::from(vec![b'a'; 100]));
        assert!(matches!(
            read_body(body, 64).await,
            Err(RelayError::PayloadTooLarge(64))
        ));
    }
}
