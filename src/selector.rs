//! Top-level selector
//!
//! Maps a menu choice to one automation or a chain of them. Chains share a
//! single [`RunConfiguration`] and pause between automations; with an
//! interval the whole chain recurs as one unit.

use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::batch::{spawn_recurring, BatchReport, BatchRunner};
use crate::config::RunConfiguration;
use crate::error::{Error, Result};
use crate::integrations::{Automation, AutomationId};
use crate::pacing::pause;
use crate::wallet::Credential;

const BASIC_CHAIN: [AutomationId; 3] = [
    AutomationId::Rubic,
    AutomationId::Beanswap,
    AutomationId::Apriori,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MenuChoice {
    Rubic,
    Beanswap,
    Apriori,
    Kintsu,
    Shmonad,
    /// Rubic, Beanswap, Apriori
    BasicChain,
    /// Basic chain, then Kintsu and shMonad
    ExtendedChain,
    Exit,
}

impl MenuChoice {
    /// Menu order
    pub const ALL: [MenuChoice; 8] = [
        MenuChoice::Rubic,
        MenuChoice::Beanswap,
        MenuChoice::Apriori,
        MenuChoice::Kintsu,
        MenuChoice::Shmonad,
        MenuChoice::BasicChain,
        MenuChoice::ExtendedChain,
        MenuChoice::Exit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MenuChoice::Rubic => "Rubic (wrap / unwrap MON)",
            MenuChoice::Beanswap => "Beanswap (random swaps)",
            MenuChoice::Apriori => "Apriori (stake / unstake / claim)",
            MenuChoice::Kintsu => "Kintsu (stake / unstake)",
            MenuChoice::Shmonad => "shMonad (deposit / redeem / bond)",
            MenuChoice::BasicChain => "Run all: Rubic -> Beanswap -> Apriori",
            MenuChoice::ExtendedChain => "Run all + Kintsu -> shMonad",
            MenuChoice::Exit => "Exit",
        }
    }

    /// Automations to run, in order; empty for `Exit`
    pub fn automations(&self) -> Vec<AutomationId> {
        match self {
            MenuChoice::Rubic => vec![AutomationId::Rubic],
            MenuChoice::Beanswap => vec![AutomationId::Beanswap],
            MenuChoice::Apriori => vec![AutomationId::Apriori],
            MenuChoice::Kintsu => vec![AutomationId::Kintsu],
            MenuChoice::Shmonad => vec![AutomationId::Shmonad],
            MenuChoice::BasicChain => BASIC_CHAIN.to_vec(),
            MenuChoice::ExtendedChain => {
                let mut ids = BASIC_CHAIN.to_vec();
                ids.extend([AutomationId::Kintsu, AutomationId::Shmonad]);
                ids
            }
            MenuChoice::Exit => Vec::new(),
        }
    }

    pub fn is_chain(&self) -> bool {
        self.automations().len() > 1
    }

    /// Whether the Kintsu token id prompt applies
    pub fn needs_token_id(&self) -> bool {
        self.automations().contains(&AutomationId::Kintsu)
    }
}

impl From<AutomationId> for MenuChoice {
    fn from(id: AutomationId) -> Self {
        match id {
            AutomationId::Rubic => MenuChoice::Rubic,
            AutomationId::Beanswap => MenuChoice::Beanswap,
            AutomationId::Apriori => MenuChoice::Apriori,
            AutomationId::Kintsu => MenuChoice::Kintsu,
            AutomationId::Shmonad => MenuChoice::Shmonad,
        }
    }
}

/// Runs menu choices against a shared batch runner
pub struct Selector {
    runner: Arc<BatchRunner>,
    automations: Vec<Arc<dyn Automation>>,
}

impl Selector {
    pub fn new(runner: Arc<BatchRunner>, automations: Vec<Arc<dyn Automation>>) -> Self {
        Self {
            runner,
            automations,
        }
    }

    fn resolve(&self, ids: &[AutomationId]) -> Result<Vec<Arc<dyn Automation>>> {
        ids.iter()
            .map(|id| {
                self.automations
                    .iter()
                    .find(|a| a.id() == *id)
                    .cloned()
                    .ok_or_else(|| Error::Config(format!("automation {} is not available", id)))
            })
            .collect()
    }

    /// One pass over `automations`, pausing between them
    pub async fn run_chain(
        &self,
        automations: &[Arc<dyn Automation>],
        credentials: &[Credential],
        run: &RunConfiguration,
    ) -> Vec<BatchReport> {
        let cancel = self.runner.cancel_token();
        let chain_pause = Duration::from_millis(self.runner.config().pacing.chain_pause_ms);
        let mut reports = Vec::with_capacity(automations.len());

        for (i, automation) in automations.iter().enumerate() {
            if i > 0 {
                info!(
                    "Next: {} in {:.0}s",
                    automation.id(),
                    chain_pause.as_secs_f64()
                );
                if pause(chain_pause, cancel).await.is_err() {
                    break;
                }
            }
            let report = self
                .runner
                .run_pass(automation.as_ref(), credentials, run)
                .await;
            reports.push(report);
        }
        reports
    }

    /// Start `choice`; each pass publishes the reports of every automation
    /// it ran
    pub fn execute(
        self: &Arc<Self>,
        choice: MenuChoice,
        credentials: Arc<Vec<Credential>>,
        run: RunConfiguration,
    ) -> Result<(JoinHandle<()>, mpsc::Receiver<Vec<BatchReport>>)> {
        let ids = choice.automations();
        if ids.is_empty() {
            return Err(Error::Config("nothing to run".to_string()));
        }
        let automations = Arc::new(self.resolve(&ids)?);
        info!(
            "Selected {}{}",
            choice.label(),
            run.interval
                .map(|i| format!(", repeating every {:.1}h", i.as_secs_f64() / 3600.0))
                .unwrap_or_default()
        );

        let selector = Arc::clone(self);
        let interval = run.interval;
        let cancel = self.runner.cancel_token().clone();
        let pass = move || {
            let selector = Arc::clone(&selector);
            let automations = Arc::clone(&automations);
            let credentials = Arc::clone(&credentials);
            let run = run.clone();
            async move {
                selector
                    .run_chain(&automations, &credentials, &run)
                    .await
            }
        };

        Ok(spawn_recurring(interval, cancel, pass))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionOutcome;
    use crate::batch::{AccountPolicy, CycleAbortPolicy};
    use crate::config::Config;
    use crate::cycle::{CyclePlan, CycleStep};
    use crate::testing::{fast_config, ok_receipt, test_credential, FnPrimitive, ScriptedChain};
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    struct Recorder {
        id: AutomationId,
        log: Arc<Mutex<Vec<AutomationId>>>,
    }

    impl Automation for Recorder {
        fn id(&self) -> AutomationId {
            self.id
        }

        fn plan(&self, _config: &Config) -> CyclePlan {
            let id = self.id;
            let log = self.log.clone();
            CyclePlan::new(vec![CycleStep::fatal(FnPrimitive::new("record", move |_| {
                log.lock().unwrap().push(id);
                Ok(ActionOutcome::Executed(ok_receipt(1)))
            }))])
        }

        fn account_policy(&self, _config: &Config) -> AccountPolicy {
            AccountPolicy {
                on_cycle_abort: CycleAbortPolicy::ContinueCycles,
                inter_cycle_pause: None,
            }
        }
    }

    fn selector(config: Config) -> (Arc<Selector>, Arc<Mutex<Vec<AutomationId>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let automations: Vec<Arc<dyn Automation>> = AutomationId::ALL
            .iter()
            .map(|id| {
                Arc::new(Recorder {
                    id: *id,
                    log: log.clone(),
                }) as Arc<dyn Automation>
            })
            .collect();
        let runner = BatchRunner::new(
            Arc::new(ScriptedChain::new()),
            Arc::new(config),
            CancellationToken::new(),
        );
        (
            Arc::new(Selector::new(Arc::new(runner), automations)),
            log,
        )
    }

    #[test]
    fn test_chain_composition() {
        assert_eq!(
            MenuChoice::BasicChain.automations(),
            vec![
                AutomationId::Rubic,
                AutomationId::Beanswap,
                AutomationId::Apriori
            ]
        );
        assert_eq!(
            MenuChoice::ExtendedChain.automations(),
            vec![
                AutomationId::Rubic,
                AutomationId::Beanswap,
                AutomationId::Apriori,
                AutomationId::Kintsu,
                AutomationId::Shmonad
            ]
        );
        assert!(MenuChoice::Exit.automations().is_empty());
        assert_eq!(
            MenuChoice::from(AutomationId::Kintsu).automations(),
            vec![AutomationId::Kintsu]
        );
        assert!(!MenuChoice::Kintsu.is_chain());
        assert!(MenuChoice::ExtendedChain.needs_token_id());
        assert!(!MenuChoice::BasicChain.needs_token_id());
    }

    #[test]
    fn test_menu_order() {
        assert_eq!(MenuChoice::ALL.first(), Some(&MenuChoice::Rubic));
        assert_eq!(MenuChoice::ALL.last(), Some(&MenuChoice::Exit));
        assert_eq!(
            MenuChoice::from_str("extended-chain", true).unwrap(),
            MenuChoice::ExtendedChain
        );
    }

    #[tokio::test]
    async fn test_extended_chain_runs_in_order() {
        let (selector, log) = selector(fast_config());
        let credentials = Arc::new(vec![test_credential(1)]);

        let (handle, mut rx) = selector
            .execute(MenuChoice::ExtendedChain, credentials, RunConfiguration::once())
            .unwrap();
        let reports = rx.recv().await.unwrap();
        handle.await.unwrap();

        let ran: Vec<AutomationId> = reports.iter().map(|r| r.automation).collect();
        assert_eq!(ran, MenuChoice::ExtendedChain.automations());
        assert_eq!(*log.lock().unwrap(), ran);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recurring_choice_publishes_each_pass() {
        let (selector, log) = selector(fast_config());
        let credentials = Arc::new(vec![test_credential(1), test_credential(2)]);
        let run = RunConfiguration::new(1, Some(1.0), 1).unwrap();

        let (handle, mut rx) = selector
            .execute(MenuChoice::Rubic, credentials, run)
            .unwrap();
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first[0].accounts.len(), 2);
        assert_ne!(first[0].run_id, second[0].run_id);

        selector.runner.cancel_token().cancel();
        handle.await.unwrap();
        assert!(rx.recv().await.is_none());
        assert!(log.lock().unwrap().len() >= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_pauses_between_automations() {
        let (selector, _) = selector(Config::default());
        let automations = selector.resolve(&MenuChoice::BasicChain.automations()).unwrap();

        let start = tokio::time::Instant::now();
        let reports = selector
            .run_chain(&automations, &[test_credential(1)], &RunConfiguration::once())
            .await;
        assert_eq!(reports.len(), 3);
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_exit_runs_nothing() {
        let (selector, log) = selector(fast_config());
        let result = selector.execute(
            MenuChoice::Exit,
            Arc::new(vec![test_credential(1)]),
            RunConfiguration::once(),
        );
        assert!(result.is_err());
        assert!(log.lock().unwrap().is_empty());
    }
}
