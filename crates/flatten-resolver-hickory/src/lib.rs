// # Hickory Address Resolver
//
// This crate provides an AddressResolver that talks directly to two fixed
// recursive upstreams (primary, then secondary) using hickory-resolver.
//
// ## Fallback Rule
//
// The secondary upstream is consulted only when the primary cannot be
// reached (I/O error, connection/protocol failure, timeout). Once an upstream
// has answered, its answer is final:
//
// | Primary outcome            | Result                         |
// |----------------------------|--------------------------------|
// | addresses                  | addresses                      |
// | NXDOMAIN / empty NOERROR   | `Ok(vec![])`, no fallback      |
// | SERVFAIL, REFUSED, ...     | `Error::Resolution`, no fallback |
// | unreachable / timeout      | ask the secondary              |
//
// ## Caching
//
// The hickory cache is disabled. Every directive resolves its target
// afresh, even when several directives share one.

use async_trait::async_trait;
use flatten_core::config::ResolverConfig;
use flatten_core::traits::AddressResolver;
use flatten_core::{Error, Result};
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{
    LookupIpStrategy, NameServerConfig, Protocol, ResolverConfig as HickoryConfig, ResolverOpts,
};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use std::fmt;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Which configured upstream a lookup goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    /// Consulted first
    Primary,
    /// Consulted only when the primary is unreachable
    Secondary,
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Upstream::Primary => f.write_str("primary"),
            Upstream::Secondary => f.write_str("secondary"),
        }
    }
}

/// How a failed lookup should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupFailure {
    /// The upstream answered that there are no addresses
    Empty,
    /// The upstream answered with an error
    Answered,
    /// The upstream could not be reached
    Unreachable,
}

/// Errors that can be classified for the fallback decision
pub trait UpstreamError: fmt::Display {
    /// Classify this error
    fn failure(&self) -> LookupFailure;
}

impl UpstreamError for ResolveError {
    fn failure(&self) -> LookupFailure {
        match self.kind() {
            ResolveErrorKind::NoRecordsFound { response_code, .. } => match *response_code {
                ResponseCode::NXDomain | ResponseCode::NoError => LookupFailure::Empty,
                _ => LookupFailure::Answered,
            },
            ResolveErrorKind::Io(_)
            | ResolveErrorKind::Proto(_)
            | ResolveErrorKind::Timeout
            | ResolveErrorKind::NoConnections => LookupFailure::Unreachable,
            _ => LookupFailure::Answered,
        }
    }
}

/// Run `lookup` against the primary, falling back to the secondary only
/// when the primary is unreachable
pub async fn resolve_with_fallback<F, Fut, E>(hostname: &str, mut lookup: F) -> Result<Vec<IpAddr>>
where
    F: FnMut(Upstream) -> Fut,
    Fut: Future<Output = std::result::Result<Vec<IpAddr>, E>>,
    E: UpstreamError,
{
    let primary_err = match lookup(Upstream::Primary).await {
        Ok(addresses) => return Ok(addresses),
        Err(e) => e,
    };

    match primary_err.failure() {
        LookupFailure::Empty => {
            tracing::debug!("{} has no addresses ({})", hostname, primary_err);
            return Ok(Vec::new());
        }
        LookupFailure::Answered => {
            return Err(Error::resolution(
                hostname,
                format!("primary upstream answered with an error: {}", primary_err),
            ));
        }
        LookupFailure::Unreachable => {
            tracing::warn!(
                "Primary upstream unreachable while resolving {}: {}; falling back to secondary",
                hostname,
                primary_err
            );
        }
    }

    match lookup(Upstream::Secondary).await {
        Ok(addresses) => Ok(addresses),
        Err(e) if e.failure() == LookupFailure::Empty => {
            tracing::debug!("{} has no addresses ({})", hostname, e);
            Ok(Vec::new())
        }
        Err(e) => Err(Error::resolution(
            hostname,
            format!("primary: {}; secondary: {}", primary_err, e),
        )),
    }
}

/// Address resolver over a fixed primary/secondary upstream pair
pub struct HickoryResolver {
    primary: TokioAsyncResolver,
    secondary: TokioAsyncResolver,
    primary_addr: SocketAddr,
    secondary_addr: SocketAddr,
}

impl fmt::Debug for HickoryResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HickoryResolver")
            .field("primary", &self.primary_addr)
            .field("secondary", &self.secondary_addr)
            .finish()
    }
}

impl HickoryResolver {
    /// Create a resolver from configuration
    pub fn new(config: &ResolverConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);

        Self {
            primary: single_upstream(config.primary, timeout),
            secondary: single_upstream(config.secondary, timeout),
            primary_addr: config.primary,
            secondary_addr: config.secondary,
        }
    }

    /// Address of an upstream
    pub fn upstream_addr(&self, upstream: Upstream) -> SocketAddr {
        match upstream {
            Upstream::Primary => self.primary_addr,
            Upstream::Secondary => self.secondary_addr,
        }
    }

    async fn lookup(&self, upstream: Upstream, hostname: &str) -> std::result::Result<Vec<IpAddr>, ResolveError> {
        let resolver = match upstream {
            Upstream::Primary => &self.primary,
            Upstream::Secondary => &self.secondary,
        };

        tracing::debug!(
            "Resolving {} via {} upstream {}",
            hostname,
            upstream,
            self.upstream_addr(upstream)
        );

        let lookup = resolver.lookup_ip(hostname).await?;
        Ok(lookup.iter().collect())
    }
}

/// Build a hickory resolver that only ever talks to `addr`
fn single_upstream(addr: SocketAddr, timeout: Duration) -> TokioAsyncResolver {
    let mut config = HickoryConfig::new();
    config.add_name_server(NameServerConfig::new(addr, Protocol::Udp));
    config.add_name_server(NameServerConfig::new(addr, Protocol::Tcp));

    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    // No retries: the secondary upstream is the only fallback
    opts.attempts = 0;
    opts.cache_size = 0;
    opts.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;

    TokioAsyncResolver::tokio(config, opts)
}

#[async_trait]
impl AddressResolver for HickoryResolver {
    async fn resolve(&self, hostname: &str) -> Result<Vec<IpAddr>> {
        resolve_with_fallback(hostname, move |upstream| self.lookup(upstream, hostname)).await
    }

    fn resolver_name(&self) -> &'static str {
        "hickory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_resolver::proto::op::Query;
    use hickory_resolver::proto::rr::{Name, RecordType as DnsRecordType};
    use std::sync::Mutex;

    /// Scripted upstream error for exercising the fallback rule
    #[derive(Debug)]
    struct FakeError(LookupFailure);

    impl fmt::Display for FakeError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "fake {:?}", self.0)
        }
    }

    impl UpstreamError for FakeError {
        fn failure(&self) -> LookupFailure {
            self.0
        }
    }

    type Answer = std::result::Result<Vec<IpAddr>, FakeError>;

    /// Run the fallback with scripted answers, returning the result and the
    /// upstreams consulted
    async fn run(primary: Answer, secondary: Answer) -> (Result<Vec<IpAddr>>, Vec<Upstream>) {
        let consulted = Mutex::new(Vec::new());
        let answers = Mutex::new(vec![Some(primary), Some(secondary)]);

        let result = resolve_with_fallback("backend.example.net", |upstream| {
            consulted.lock().unwrap().push(upstream);
            let index = match upstream {
                Upstream::Primary => 0,
                Upstream::Secondary => 1,
            };
            let answer = answers.lock().unwrap()[index].take().unwrap();
            async move { answer }
        })
        .await;

        let consulted = consulted.into_inner().unwrap();
        (result, consulted)
    }

    fn ips(list: &[&str]) -> Vec<IpAddr> {
        list.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[tokio::test]
    async fn test_primary_answer_is_used() {
        let (result, consulted) = run(Ok(ips(&["10.0.0.1", "2001:db8::1"])), Ok(ips(&["10.9.9.9"]))).await;

        assert_eq!(result.unwrap(), ips(&["10.0.0.1", "2001:db8::1"]));
        assert_eq!(consulted, vec![Upstream::Primary]);
    }

    #[tokio::test]
    async fn test_unreachable_primary_falls_back() {
        let (result, consulted) = run(
            Err(FakeError(LookupFailure::Unreachable)),
            Ok(ips(&["10.0.0.2"])),
        )
        .await;

        assert_eq!(result.unwrap(), ips(&["10.0.0.2"]));
        assert_eq!(consulted, vec![Upstream::Primary, Upstream::Secondary]);
    }

    #[tokio::test]
    async fn test_empty_answer_is_not_retried() {
        let (result, consulted) = run(
            Err(FakeError(LookupFailure::Empty)),
            Ok(ips(&["10.0.0.2"])),
        )
        .await;

        assert!(result.unwrap().is_empty());
        assert_eq!(consulted, vec![Upstream::Primary]);
    }

    #[tokio::test]
    async fn test_answered_failure_is_not_retried() {
        let (result, consulted) = run(
            Err(FakeError(LookupFailure::Answered)),
            Ok(ips(&["10.0.0.2"])),
        )
        .await;

        assert!(matches!(result, Err(Error::Resolution { .. })));
        assert_eq!(consulted, vec![Upstream::Primary]);
    }

    #[tokio::test]
    async fn test_both_unreachable_is_resolution_error() {
        let (result, consulted) = run(
            Err(FakeError(LookupFailure::Unreachable)),
            Err(FakeError(LookupFailure::Unreachable)),
        )
        .await;

        match result {
            Err(Error::Resolution { hostname, message }) => {
                assert_eq!(hostname, "backend.example.net");
                assert!(message.contains("primary"));
                assert!(message.contains("secondary"));
            }
            other => panic!("expected Resolution error, got: {other:?}"),
        }
        assert_eq!(consulted, vec![Upstream::Primary, Upstream::Secondary]);
    }

    #[tokio::test]
    async fn test_empty_secondary_answer_after_fallback() {
        let (result, _) = run(
            Err(FakeError(LookupFailure::Unreachable)),
            Err(FakeError(LookupFailure::Empty)),
        )
        .await;

        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn test_transport_errors_are_unreachable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(ResolveError::from(io).failure(), LookupFailure::Unreachable);
        assert_eq!(
            ResolveError::from(ResolveErrorKind::Timeout).failure(),
            LookupFailure::Unreachable
        );
        assert_eq!(
            ResolveError::from(ResolveErrorKind::NoConnections).failure(),
            LookupFailure::Unreachable
        );
    }

    fn nx(response_code: ResponseCode) -> ResolveError {
        let query = Query::query(
            Name::from_ascii("backend.example.net.").unwrap(),
            DnsRecordType::A,
        );
        ResolveErrorKind::NoRecordsFound {
            query: Box::new(query),
            soa: None,
            negative_ttl: None,
            response_code,
            trusted: false,
        }
        .into()
    }

    #[test]
    fn test_nxdomain_and_nodata_are_empty() {
        assert_eq!(nx(ResponseCode::NXDomain).failure(), LookupFailure::Empty);
        assert_eq!(nx(ResponseCode::NoError).failure(), LookupFailure::Empty);
    }

    #[test]
    fn test_error_rcodes_are_answered() {
        assert_eq!(nx(ResponseCode::ServFail).failure(), LookupFailure::Answered);
        assert_eq!(nx(ResponseCode::Refused).failure(), LookupFailure::Answered);
    }

    #[tokio::test]
    async fn test_real_servfail_is_not_retried() {
        let (result, consulted) = {
            let consulted = Mutex::new(Vec::new());
            let result = resolve_with_fallback("backend.example.net", |upstream| {
                consulted.lock().unwrap().push(upstream);
                let answer: std::result::Result<Vec<IpAddr>, ResolveError> = match upstream {
                    Upstream::Primary => Err(nx(ResponseCode::ServFail)),
                    Upstream::Secondary => Ok(ips(&["10.0.0.2"])),
                };
                async move { answer }
            })
            .await;
            (result, consulted.into_inner().unwrap())
        };

        assert!(matches!(result, Err(Error::Resolution { .. })));
        assert_eq!(consulted, vec![Upstream::Primary]);
    }

    #[test]
    fn test_message_errors_are_answered() {
        assert_eq!(
            ResolveError::from("malformed answer").failure(),
            LookupFailure::Answered
        );
    }

    #[tokio::test]
    async fn test_resolver_uses_configured_upstreams() {
        let resolver = HickoryResolver::new(&ResolverConfig::default());

        assert_eq!(
            resolver.upstream_addr(Upstream::Primary),
            "1.1.1.1:53".parse().unwrap()
        );
        assert_eq!(
            resolver.upstream_addr(Upstream::Secondary),
            "8.8.8.8:53".parse().unwrap()
        );
        assert_eq!(resolver.resolver_name(), "hickory");
    }
}
