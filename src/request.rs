//! Composable options for [`curl::request`](crate::curl::request).
//!
//! An option may adjust the HTTP client (trust roots, DNS overrides, cookie
//! storage) and the outgoing request (headers). `()` is the empty option, and
//! [`options`] collects several into one list applied in order.

use std::{
    error::Error as StdError,
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use reqwest::{
    cookie::Jar,
    dns::{Addrs, Name, Resolve, Resolving},
    header::{HeaderName, HeaderValue, HOST},
    Certificate, ClientBuilder, Identity, RequestBuilder,
};
use tokio::net::lookup_host;

use crate::{HarnessError, Result};

/// Customizes the client and request built by [`curl::request`](crate::curl::request).
pub trait RequestOption: Send + Sync {
    fn apply_to_client(&self, builder: ClientBuilder) -> Result<ClientBuilder> {
        Ok(builder)
    }

    fn apply_to_request(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        Ok(builder)
    }
}

impl RequestOption for () {}

impl<T: RequestOption + ?Sized> RequestOption for Box<T> {
    fn apply_to_client(&self, builder: ClientBuilder) -> Result<ClientBuilder> {
        (**self).apply_to_client(builder)
    }

    fn apply_to_request(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        (**self).apply_to_request(builder)
    }
}

/// Ordered list of options. Later members win when two set the same field.
#[derive(Default)]
pub struct RequestOptionList {
    options: Vec<Box<dyn RequestOption>>,
}

/// Starts an empty [`RequestOptionList`].
pub fn options() -> RequestOptionList {
    RequestOptionList::default()
}

impl RequestOptionList {
    pub fn with(mut self, option: impl RequestOption + 'static) -> Self {
        self.options.push(Box::new(option));
        self
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

impl RequestOption for RequestOptionList {
    fn apply_to_client(&self, builder: ClientBuilder) -> Result<ClientBuilder> {
        self.options
            .iter()
            .try_fold(builder, |builder, option| option.apply_to_client(builder))
    }

    fn apply_to_request(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        self.options
            .iter()
            .try_fold(builder, |builder, option| option.apply_to_request(builder))
    }
}

/// Sets one request header, replacing any earlier value.
#[derive(Clone, Debug)]
pub struct Header {
    name: String,
    value: String,
}

pub fn with_header(name: impl Into<String>, value: impl Into<String>) -> Header {
    Header {
        name: name.into(),
        value: value.into(),
    }
}

/// Overrides the `Host` header, e.g. to route through an ingress gateway by
/// its IP while matching a virtual host.
pub fn with_host(host: impl Into<String>) -> Header {
    with_header(HOST.as_str(), host)
}

impl RequestOption for Header {
    fn apply_to_request(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        let name = HeaderName::from_bytes(self.name.as_bytes()).map_err(|err| {
            HarnessError::InvalidRequest(format!("header name '{}': {err}", self.name))
        })?;
        let value = HeaderValue::from_str(&self.value).map_err(|err| {
            HarnessError::InvalidRequest(format!("value of header '{}': {err}", self.name))
        })?;
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(name, value);
        // `headers` replaces existing values, `header` would append
        Ok(builder.headers(headers))
    }
}

/// Shares a cookie jar between requests, e.g. to keep a login session.
#[derive(Clone, Debug)]
pub struct CookieJar {
    jar: Arc<Jar>,
}

pub fn with_cookie_jar(jar: Arc<Jar>) -> CookieJar {
    CookieJar { jar }
}

impl RequestOption for CookieJar {
    fn apply_to_client(&self, builder: ClientBuilder) -> Result<ClientBuilder> {
        Ok(builder.cookie_provider(self.jar.clone()))
    }
}

/// Trusts `ca_file` and sends requests for `host` to `ingress_host:port`.
///
/// The request URL keeps `host` so that SNI and certificate verification use
/// it; `port` must match the port in that URL. `ingress_host` is resolved
/// when the request is sent, so a lookup failure shows up as a transport
/// error.
#[derive(Clone, Debug)]
pub struct Tls {
    ca_file: PathBuf,
    host: String,
    ingress_host: String,
    port: u16,
    client_certificate: Option<(PathBuf, PathBuf)>,
}

pub fn with_tls(
    ca_file: impl Into<PathBuf>,
    host: impl Into<String>,
    ingress_host: impl Into<String>,
    port: u16,
) -> Tls {
    Tls {
        ca_file: ca_file.into(),
        host: host.into(),
        ingress_host: ingress_host.into(),
        port,
        client_certificate: None,
    }
}

impl Tls {
    /// Presents a client certificate, for mutual TLS gateways.
    pub fn with_client_certificate(
        mut self,
        cert_file: impl Into<PathBuf>,
        key_file: impl Into<PathBuf>,
    ) -> Self {
        self.client_certificate = Some((cert_file.into(), key_file.into()));
        self
    }
}

impl RequestOption for Tls {
    fn apply_to_client(&self, builder: ClientBuilder) -> Result<ClientBuilder> {
        let ca = read_pem(&self.ca_file)?;
        let ca = Certificate::from_pem(&ca).map_err(|err| {
            HarnessError::Tls(format!("invalid CA certificate {}: {err}", self.ca_file.display()))
        })?;
        let mut builder = builder.add_root_certificate(ca);

        if let Some((cert_file, key_file)) = &self.client_certificate {
            let mut pem = read_pem(cert_file)?;
            pem.push(b'\n');
            pem.extend(read_pem(key_file)?);
            let identity = Identity::from_pem(&pem).map_err(|err| {
                HarnessError::Tls(format!(
                    "invalid client certificate {} / {}: {err}",
                    cert_file.display(),
                    key_file.display()
                ))
            })?;
            builder = builder.identity(identity);
        }

        let resolver = IngressResolver {
            host: self.host.clone(),
            ingress_host: self.ingress_host.clone(),
            port: self.port,
        };
        Ok(builder.dns_resolver(Arc::new(resolver)))
    }
}

/// Resolves `host` to the addresses of `ingress_host` and every other name
/// to its own addresses, without blocking the runtime.
#[derive(Clone, Debug)]
struct IngressResolver {
    host: String,
    ingress_host: String,
    port: u16,
}

impl Resolve for IngressResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let target = if name.as_str().eq_ignore_ascii_case(&self.host) {
            self.ingress_host.clone()
        } else {
            name.as_str().to_owned()
        };
        let port = self.port;
        Box::pin(async move {
            let addrs: Vec<SocketAddr> = lookup_host((target.as_str(), port))
                .await
                .map_err(|err| {
                    HarnessError::Tls(format!("failed to resolve {target}:{port}: {err}"))
                })?
                .collect();
            if addrs.is_empty() {
                let err = HarnessError::Tls(format!("{target}:{port} resolved to no addresses"));
                return Err(err.into());
            }
            let addrs: Addrs = Box::new(addrs.into_iter());
            Ok::<_, Box<dyn StdError + Send + Sync>>(addrs)
        })
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|err| HarnessError::Tls(format!("failed to read {}: {err}", path.display())))
}

#[cfg(test)]
mod tests {
    use reqwest::{header::HeaderValue, Client};

    use super::*;
    use crate::cert::CertBuilder;

    fn built(option: &dyn RequestOption) -> reqwest::Request {
        let builder = Client::new().get("http://productpage.bookinfo:9080/productpage");
        option.apply_to_request(builder).unwrap().build().unwrap()
    }

    #[test]
    fn header_is_set_on_request() {
        let request = built(&with_header("x-request-id", "abc"));
        assert_eq!(request.headers()["x-request-id"], "abc");
    }

    #[test]
    fn host_sets_host_header() {
        let request = built(&with_host("bookinfo.example.com"));
        assert_eq!(request.headers()[HOST], "bookinfo.example.com");
    }

    #[test]
    fn later_options_win() {
        let list = options()
            .with(with_header("end-user", "jason"))
            .with(())
            .with(with_header("end-user", "admin"));
        let request = built(&list);

        assert_eq!(list.len(), 3);
        let values: Vec<&HeaderValue> = request.headers().get_all("end-user").iter().collect();
        assert_eq!(values, vec![&HeaderValue::from_static("admin")]);
    }

    #[test]
    fn invalid_header_is_an_error() {
        let builder = Client::new().get("http://localhost/");
        let err = with_header("bad header", "x").apply_to_request(builder).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidRequest(_)), "{err}");
    }

    #[test]
    fn empty_option_changes_nothing() {
        let request = built(&());
        assert!(request.headers().is_empty());
        assert!(options().is_empty());
    }

    #[test]
    fn tls_with_missing_ca_is_an_error() {
        let option = with_tls("/nonexistent/ca.pem", "bookinfo.example.com", "127.0.0.1", 443);
        let err = option.apply_to_client(Client::builder()).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/ca.pem"), "{err}");
    }

    #[test]
    fn tls_builds_client_with_generated_material() {
        let dir = tempfile::tempdir().unwrap();
        let ca = CertBuilder::new_ca("mesh-harness test CA").unwrap();
        let server = CertBuilder::new_server_cert(&ca, &["bookinfo.example.com"]).unwrap();
        let client = CertBuilder::new_client_cert(&ca, "tester").unwrap();
        let ca_files = ca.write_files(dir.path(), "ca").unwrap();
        server.write_files(dir.path(), "server").unwrap();
        let client_files = client.write_files(dir.path(), "client").unwrap();

        let option = with_tls(&ca_files.cert, "bookinfo.example.com", "127.0.0.1", 8443)
            .with_client_certificate(&client_files.cert, &client_files.key);
        let builder = option.apply_to_client(Client::builder()).unwrap();

        assert!(builder.build().is_ok());
    }

    #[tokio::test]
    async fn ingress_resolver_sends_host_to_ingress_address() {
        let resolver = IngressResolver {
            host: "bookinfo.example.com".to_owned(),
            ingress_host: "127.0.0.1".to_owned(),
            port: 8443,
        };

        let name: Name = "bookinfo.example.com".parse().unwrap();
        let addrs: Vec<SocketAddr> = resolver.resolve(name).await.unwrap().collect();
        assert_eq!(addrs, vec!["127.0.0.1:8443".parse::<SocketAddr>().unwrap()]);

        let other: Name = "127.0.0.2".parse().unwrap();
        let addrs: Vec<SocketAddr> = resolver.resolve(other).await.unwrap().collect();
        assert_eq!(addrs, vec!["127.0.0.2:8443".parse::<SocketAddr>().unwrap()]);
    }

    #[test]
    fn cookie_jar_builds_client() {
        let jar = Arc::new(Jar::default());
        let builder = with_cookie_jar(jar).apply_to_client(Client::builder()).unwrap();
        assert!(builder.build().is_ok());
    }
}
