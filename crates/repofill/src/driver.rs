//! The Driver: one populate run from input tokens to a report.
//!
//! ```text
//! Init ──> (Reconciling) ──> Discovering ──> Transferring ──> Done
//!   │                              ^
//!   └── literal mode skips ────────┘
//! ```
//!
//! Only a failure to open the network session aborts a run. Everything
//! else is recorded per name and the run carries on.

use repofill_core::Name;
use repofill_net::{ContentNetwork, Session};
use repofill_sync::{
    reconcile_local, Discovery, ErrorList, LocalReconciliation, RoundConfig, TransferPipeline,
};

use crate::config::PopulateConfig;
use crate::error::{PopulateError, Result};
use crate::report::{Phase, PopulateReport};

/// Runs populate passes against a content network.
pub struct Driver<N: ContentNetwork> {
    network: N,
    config: PopulateConfig,
}

impl<N: ContentNetwork> Driver<N> {
    pub fn new(network: N, config: PopulateConfig) -> Self {
        Self {
            network,
            config: config.normalized(),
        }
    }

    pub fn config(&self) -> &PopulateConfig {
        &self.config
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    /// Run one pass over `inputs`.
    ///
    /// In enumerate mode each input is a prefix to walk; otherwise each is a
    /// literal name to fetch. The session is opened before any input is
    /// looked at and closed once at the end.
    pub async fn run<I>(&self, inputs: I) -> Result<PopulateReport>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let session = self
            .network
            .open_session()
            .await
            .map_err(PopulateError::Connection)?;

        let mut report = PopulateReport::default();
        enter(&mut report, Phase::Init);
        let names = parse_inputs(inputs, &mut report.failures);

        let selected = if self.config.enumerate {
            self.discover(&session, names, &mut report).await
        } else {
            self.select_literal(&session, names, &mut report).await
        };

        enter(&mut report, Phase::Transferring);
        let pipeline = TransferPipeline::new(&session, self.config.addressing, self.config.target)
            .with_chunk_size(self.config.chunk_size);
        report.transferred = pipeline.transfer_all(&selected, &mut report.failures).await;

        if let Err(e) = session.close().await {
            tracing::warn!("error closing session: {}", e);
        }
        enter(&mut report, Phase::Done);

        tracing::info!(
            transferred = report.transferred.len(),
            failed = report.failures.len(),
            up_to_date = report.up_to_date,
            "run complete"
        );
        Ok(report)
    }

    /// Walk every seed prefix and return the names selected for transfer.
    async fn discover<S: Session>(
        &self,
        session: &S,
        seeds: Vec<Name>,
        report: &mut PopulateReport,
    ) -> Vec<Name> {
        let filter = if self.config.verify {
            let pass = self.reconcile(session, seeds.clone(), report).await;
            Some(pass.record)
        } else {
            None
        };

        enter(report, Phase::Discovering);
        let round = RoundConfig::network(self.config.required_answers, self.config.round_timeout);
        let mut discovery = Discovery::new(seeds, round, filter);
        discovery.run(session, &mut report.failures).await;

        let stats = discovery.stats();
        report.rounds = stats.rounds;
        report.timed_out_rounds = stats.timed_out_rounds;
        report.up_to_date += stats.up_to_date;

        discovery.into_downloads().into_iter().collect()
    }

    /// Literal names are transferred in input order. With verify on, the
    /// local pass still runs so the report shows what was already stored,
    /// but a literal name is always fetched: its remote version is unknown
    /// until it is read.
    async fn select_literal<S: Session>(
        &self,
        session: &S,
        names: Vec<Name>,
        report: &mut PopulateReport,
    ) -> Vec<Name> {
        if self.config.verify {
            let pass = self.reconcile(session, names.clone(), report).await;
            for name in names.iter().filter(|name| pass.record.contains(name)) {
                tracing::debug!("{} has a local version; fetching the newest", name.to_uri());
            }
        }
        names
    }

    async fn reconcile<S: Session>(
        &self,
        session: &S,
        seeds: Vec<Name>,
        report: &mut PopulateReport,
    ) -> LocalReconciliation {
        enter(report, Phase::Reconciling);
        let pass = reconcile_local(
            session,
            seeds,
            self.config.round_timeout,
            self.config.addressing,
            &mut report.failures,
        )
        .await;
        report.local_rounds = pass.rounds;
        pass
    }
}

fn enter(report: &mut PopulateReport, phase: Phase) {
    tracing::debug!(%phase, "entering phase");
    report.phases.push(phase);
}

/// Parse input tokens, recording the malformed ones verbatim.
fn parse_inputs<I>(inputs: I, failures: &mut ErrorList) -> Vec<Name>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut names = Vec::new();
    for token in inputs {
        let token = token.as_ref();
        match Name::parse(token) {
            Ok(name) => names.push(name),
            Err(e) => {
                tracing::warn!("skipping input {:?}: {}", token, e);
                failures.push(token);
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use repofill_core::Version;
    use repofill_net::MemoryNetwork;
    use std::time::Duration;

    fn name(s: &str) -> Name {
        Name::parse(s).unwrap()
    }

    fn fast() -> PopulateConfig {
        PopulateConfig::new().with_round_timeout(Duration::from_millis(100))
    }

    #[test]
    fn test_parse_inputs_keeps_going_after_bad_token() {
        let mut failures = ErrorList::new();
        let names = parse_inputs(["bad name", "validPrefix/x"], &mut failures);
        assert_eq!(names, vec![name("/validPrefix/x")]);
        assert_eq!(failures.into_vec(), vec!["bad name".to_string()]);
    }

    #[tokio::test]
    async fn test_literal_mode_skips_discovery() {
        let network = MemoryNetwork::new();
        let src = network.add_source();
        network.publish(src, &name("/a/doc"), Version(1), "hello");

        let driver = Driver::new(network.clone(), fast());
        let report = driver.run(["/a/doc"]).await.unwrap();

        assert_eq!(report.phases, vec![Phase::Init, Phase::Transferring, Phase::Done]);
        assert!(network.registrations().is_empty());
        assert_eq!(report.transferred_names().cloned().collect::<Vec<_>>(), vec![name("/a/doc")]);
        assert_eq!(network.closed_sessions(), 1);
    }

    #[tokio::test]
    async fn test_enumerate_with_verify_walks_every_phase() {
        let network = MemoryNetwork::new();
        let src = network.add_source();
        network.publish(src, &name("/a/doc"), Version(1), "hello");

        let driver = Driver::new(network.clone(), fast().with_enumerate(true).with_verify(true));
        let report = driver.run(["/a"]).await.unwrap();

        assert_eq!(
            report.phases,
            vec![
                Phase::Init,
                Phase::Reconciling,
                Phase::Discovering,
                Phase::Transferring,
                Phase::Done
            ]
        );
        assert!(report.is_clean());
        assert_eq!(report.bytes(), 5);
    }

    #[tokio::test]
    async fn test_refused_connection_is_fatal() {
        let network = MemoryNetwork::new();
        network.refuse_connections();

        let driver = Driver::new(network.clone(), fast());
        let err = driver.run(["/a"]).await.unwrap_err();
        assert!(matches!(err, PopulateError::Connection(_)));
        assert!(network.registrations().is_empty());
    }
}
