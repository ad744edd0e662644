//! The delegation chain check: SOA health query, NS walk from the root down
//! to the domain, DS at the parent, DNSKEY at the child, DS recomputation and
//! matching.
//!
//! Terminal failures end the run with a Failed [`Report`]; fetch and
//! calculation problems are recorded as [`Warning`]s and the run finishes.

mod delegation;
mod digest;
mod error;
mod fetch;
mod health;
mod matcher;
mod options;
mod types;

pub use delegation::{
    DNS_PORT, DelegationError, HostResolver, bootstrap_resolver, first_address, resolve_ns,
};
pub use digest::{DigestError, DigestType, calculate_ds, canonical_owner, derive_ds, key_tag};
pub use error::CheckError;
pub use fetch::{fetch_dnskey, fetch_ds};
pub use health::{ZoneStatus, zone_health};
pub use matcher::match_chain;
pub use options::{CancelToken, CheckOptions, DEFAULT_TIMEOUT_MS, DigestPolicy, parse_resolver};
pub use types::{
    Answer, CalculatedDs, ChainState, DnskeyRecord, DsRecord, FailureKind, JobStatus, Matching,
    Nameservers, Question, Registry, Report, Warning, WarningStage, ZoneLevel,
};

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use trust_dns_proto::op::Message;
use trust_dns_proto::rr::RecordType;
use trust_dns_resolver::Resolver;

use crate::domain::{NormalizedDomain, normalize_domain};
use crate::query::{Exchange, Lookup, NetExchange, QueryClient, QueryError};

/// Check `domain` with `options`. Never panics and never returns an error:
/// every failure is described by the report.
///
/// ```no_run
/// use dnssec_check::{CheckOptions, check_dnssec};
///
/// let report = check_dnssec("example.com", &CheckOptions::default());
/// println!("{}: {}", report.question.status, report.chain_state());
/// ```
pub fn check_dnssec(domain: &str, options: &CheckOptions) -> Report {
    check_dnssec_with_cancel(domain, options, &CancelToken::new())
}

/// Same as [`check_dnssec`], aborting early once `cancel` fires.
pub fn check_dnssec_with_cancel(
    domain: &str,
    options: &CheckOptions,
    cancel: &CancelToken,
) -> Report {
    let normalized = match normalize_domain(domain) {
        Ok(normalized) => normalized,
        Err(source) => {
            warn!(%domain, error = %source, "domain rejected");
            return failed_report(domain.trim(), CheckError::InvalidDomain { source });
        }
    };
    match DnssecChecker::new(options.clone()) {
        Ok(checker) => checker.check_with_cancel(&normalized, cancel),
        Err(err) => {
            warn!(domain = %normalized.ascii, error = %err, "checker setup failed");
            failed_report(&normalized.ascii, err)
        }
    }
}

fn failed_report(domain: &str, err: CheckError) -> Report {
    let mut report = Report::started(domain);
    report.fail(err.kind(), err.to_string());
    report
}

/// Runs checks with one set of options. The wire layer and the nameserver
/// address lookup are pluggable; `DnssecChecker::new` wires the real ones.
pub struct DnssecChecker<E = NetExchange, H = Resolver> {
    options: CheckOptions,
    client: QueryClient<E>,
    hosts: H,
}

impl DnssecChecker<NetExchange, Resolver> {
    pub fn new(options: CheckOptions) -> Result<Self, CheckError> {
        let hosts =
            bootstrap_resolver(&options).map_err(|source| CheckError::ResolverInit { source })?;
        Ok(Self::with_parts(options, NetExchange, hosts))
    }
}

impl<E, H> DnssecChecker<E, H>
where
    E: Exchange + Sync,
    H: HostResolver,
{
    pub fn with_parts(options: CheckOptions, exchange: E, hosts: H) -> Self {
        let client = QueryClient::with_exchange(exchange, options.timeout())
            .with_edns_payload(options.edns_payload);
        Self {
            options,
            client,
            hosts,
        }
    }

    pub fn options(&self) -> &CheckOptions {
        &self.options
    }

    pub fn check(&self, domain: &NormalizedDomain) -> Report {
        self.check_with_cancel(domain, &CancelToken::new())
    }

    pub fn check_with_cancel(&self, domain: &NormalizedDomain, cancel: &CancelToken) -> Report {
        let run = RunContext::new(cancel.clone(), self.options.deadline(), self.client.timeout());
        let mut report = Report::started(domain.ascii.as_str());
        info!(domain = %domain.ascii, resolver = %self.options.resolver, "dnssec check started");

        match self.run(domain, &run, &mut report) {
            Ok(()) => {
                report.succeed();
                info!(
                    domain = %domain.ascii,
                    ds = report.answer.ds_record_count,
                    dnskey = report.answer.dnskey_record_count,
                    matched = report.answer.matching.len(),
                    state = %report.chain_state(),
                    "dnssec check done"
                );
            }
            Err(err) => {
                let err = run.explain(err);
                warn!(domain = %domain.ascii, error = %err, "dnssec check failed");
                report.fail(err.kind(), err.to_string());
            }
        }
        report
    }

    fn run(
        &self,
        domain: &NormalizedDomain,
        run: &RunContext,
        report: &mut Report,
    ) -> Result<(), CheckError> {
        let lookup = Bounded {
            client: &self.client,
            run,
        };
        report.answer.registry = Registry {
            tld: domain.registry.clone(),
            icann: domain.icann,
        };

        run.checkpoint()?;
        let status = zone_health(&lookup, &domain.ascii, self.options.resolver);
        report.zone_status = Some(status);
        if !status.is_ok() {
            return Err(CheckError::ZoneUnhealthy { status });
        }

        let root = self.nameservers(&lookup, run, ZoneLevel::Root, ".", self.options.resolver)?;
        report.answer.nameservers.root = root.clone();
        let root_addr = self.address(run, ZoneLevel::Root, ".", &root)?;

        let registry =
            self.nameservers(&lookup, run, ZoneLevel::Registry, &domain.registry, root_addr)?;
        report.answer.nameservers.registry = registry.clone();
        let registry_addr = self.address(run, ZoneLevel::Registry, &domain.registry, &registry)?;

        let zone = self.nameservers(&lookup, run, ZoneLevel::Domain, &domain.ascii, registry_addr)?;
        report.answer.nameservers.domain = zone.clone();
        let domain_addr = self.address(run, ZoneLevel::Domain, &domain.ascii, &zone)?;

        run.checkpoint()?;
        let (ds, dnskeys) = self.fetch(&lookup, &domain.ascii, registry_addr, domain_addr);
        let ds = ds.unwrap_or_else(|err| {
            warn!(domain = %domain.ascii, server = %registry_addr, error = %err, "DS fetch failed");
            report.warnings.push(Warning::new(WarningStage::DsFetch, err.to_string()));
            Vec::new()
        });
        let dnskeys = dnskeys.unwrap_or_else(|err| {
            warn!(domain = %domain.ascii, server = %domain_addr, error = %err, "DNSKEY fetch failed");
            report.warnings.push(Warning::new(WarningStage::DnskeyFetch, err.to_string()));
            Vec::new()
        });
        if dnskeys.is_empty() {
            info!(domain = %domain.ascii, "no DNSKEY published");
        }
        report.answer.ds_record_count = ds.len();
        report.answer.dnskey_record_count = dnskeys.len();
        report.answer.ds_records = ds;
        report.answer.dnskey_records = dnskeys;

        if report.answer.ds_records.is_empty() || report.answer.dnskey_records.is_empty() {
            debug!(domain = %domain.ascii, "nothing to calculate");
            return Ok(());
        }

        let mut calculated = Vec::new();
        for digest_type in self.options.digest_policy.digest_types(&report.answer.ds_records) {
            run.checkpoint()?;
            match calculate_ds(&lookup, &domain.ascii, digest_type, domain_addr) {
                Ok(mut set) => calculated.append(&mut set),
                Err(err) => {
                    warn!(domain = %domain.ascii, digest_type, error = %err, "DS calculation failed");
                    report
                        .warnings
                        .push(Warning::new(WarningStage::Calculation, err.to_string()));
                }
            }
        }
        report.answer.calculated_ds = calculated.iter().map(|c| c.ds.clone()).collect();
        let matching = match_chain(&report.answer.ds_records, &calculated);
        report.answer.matching = matching;
        Ok(())
    }

    fn nameservers<L: Lookup + ?Sized>(
        &self,
        lookup: &L,
        run: &RunContext,
        level: ZoneLevel,
        zone: &str,
        server: SocketAddr,
    ) -> Result<Vec<String>, CheckError> {
        run.checkpoint()?;
        info!(%level, %zone, %server, "resolving nameservers");
        resolve_ns(lookup, &self.hosts, zone, server, self.options.follow_referrals).map_err(
            |source| {
                warn!(%level, zone = source.zone(), error = %source, "no nameservers found");
                CheckError::NoNameservers { level, source }
            },
        )
    }

    fn address(
        &self,
        run: &RunContext,
        level: ZoneLevel,
        zone: &str,
        hosts: &[String],
    ) -> Result<SocketAddr, CheckError> {
        run.checkpoint()?;
        let (host, addr) = first_address(&self.hosts, hosts)
            .ok_or_else(|| CheckError::no_address(level, zone))?;
        debug!(%level, %zone, %host, %addr, "nameserver selected");
        Ok(addr)
    }

    /// DS from the registry server and DNSKEY from the domain server,
    /// concurrently unless `parallel_fetch` is off.
    fn fetch<L: Lookup + Sync + ?Sized>(
        &self,
        lookup: &L,
        domain: &str,
        registry: SocketAddr,
        zone: SocketAddr,
    ) -> (
        Result<Vec<DsRecord>, QueryError>,
        Result<Vec<DnskeyRecord>, QueryError>,
    ) {
        if !self.options.parallel_fetch {
            return (
                fetch_ds(lookup, domain, registry),
                fetch_dnskey(lookup, domain, zone),
            );
        }
        std::thread::scope(|scope| {
            let ds = scope.spawn(|| fetch_ds(lookup, domain, registry));
            let dnskeys = fetch_dnskey(lookup, domain, zone);
            let ds = ds
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            (ds, dnskeys)
        })
    }
}

/// Cancellation and deadline state of one run.
struct RunContext {
    cancel: CancelToken,
    deadline: Option<Instant>,
    timeout: Duration,
}

impl RunContext {
    fn new(cancel: CancelToken, budget: Option<Duration>, timeout: Duration) -> Self {
        Self {
            cancel,
            deadline: budget.map(|budget| Instant::now() + budget),
            timeout,
        }
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn checkpoint(&self) -> Result<(), CheckError> {
        if self.cancel.is_cancelled() {
            return Err(CheckError::Cancelled);
        }
        if self.expired() {
            return Err(CheckError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Per-query timeout clamped to what is left of the deadline; `None`
    /// once nothing is left.
    fn query_timeout(&self) -> Option<Duration> {
        match self.deadline {
            None => Some(self.timeout),
            Some(deadline) => deadline
                .checked_duration_since(Instant::now())
                .filter(|left| !left.is_zero())
                .map(|left| left.min(self.timeout)),
        }
    }

    /// A stage that failed because the run was cancelled or ran out of
    /// time reports that instead of its own error.
    fn explain(&self, err: CheckError) -> CheckError {
        match self.checkpoint() {
            Err(abort) => abort,
            Ok(()) => err,
        }
    }
}

/// Query client seen through the run's cancellation and deadline.
struct Bounded<'a, E> {
    client: &'a QueryClient<E>,
    run: &'a RunContext,
}

impl<E: Exchange> Lookup for Bounded<'_, E> {
    fn lookup(
        &self,
        name: &str,
        record_type: RecordType,
        server: SocketAddr,
    ) -> Result<Message, QueryError> {
        if self.run.cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }
        let timeout = self.run.query_timeout().ok_or(QueryError::Cancelled)?;
        self.client.query_within(name, record_type, server, timeout)
    }
}
