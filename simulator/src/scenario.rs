//! Simulation scenarios.

use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;

/// Workload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScenarioKind {
    /// Random deposits, withdrawals and transfers across all accounts.
    Mixed,
    /// Many concurrent unit withdrawals against the first account.
    OverdrawRace,
    /// Opposite-direction transfers within account pairs.
    TransferStorm,
}

/// One operation to run against the ledger. Accounts are indexes into the
/// opened account list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PlannedOp {
    Deposit { account: usize, amount: Decimal },
    Withdraw { account: usize, amount: Decimal },
    Transfer { from: usize, to: usize, amount: Decimal },
}

/// A simulation scenario.
#[derive(Debug, Clone, Serialize)]
pub struct Scenario {
    pub kind: ScenarioKind,
    /// Scenario name.
    pub name: String,
    /// Description.
    pub description: String,
}

impl Scenario {
    /// Load a scenario by name.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "mixed" => Ok(Self::new(
                ScenarioKind::Mixed,
                name,
                "Random deposits, withdrawals and transfers",
            )),
            "overdraw-race" => Ok(Self::new(
                ScenarioKind::OverdrawRace,
                name,
                "Concurrent unit withdrawals racing to drain one account",
            )),
            "transfer-storm" => Ok(Self::new(
                ScenarioKind::TransferStorm,
                name,
                "Opposite-direction transfers between account pairs",
            )),
            _ => Err(anyhow::anyhow!("Unknown scenario: {}", name)),
        }
    }

    fn new(kind: ScenarioKind, name: &str, description: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            description: description.to_string(),
        }
    }

    /// Minimum number of accounts the scenario needs.
    pub fn min_accounts(&self) -> usize {
        match self.kind {
            ScenarioKind::Mixed | ScenarioKind::OverdrawRace => 1,
            ScenarioKind::TransferStorm => 2,
        }
    }

    /// Generate the operation list.
    pub fn plan(&self, rng: &mut StdRng, accounts: usize, operations: usize) -> Vec<PlannedOp> {
        (0..operations)
            .map(|_| match self.kind {
                ScenarioKind::OverdrawRace => PlannedOp::Withdraw {
                    account: 0,
                    amount: Decimal::ONE,
                },
                ScenarioKind::TransferStorm => {
                    let pair = rng.gen_range(0..accounts / 2) * 2;
                    let (from, to) = if rng.gen_bool(0.5) {
                        (pair, pair + 1)
                    } else {
                        (pair + 1, pair)
                    };
                    PlannedOp::Transfer {
                        from,
                        to,
                        amount: random_amount(rng),
                    }
                }
                ScenarioKind::Mixed => {
                    let account = rng.gen_range(0..accounts);
                    match rng.gen_range(0..10) {
                        0..=2 => PlannedOp::Deposit {
                            account,
                            amount: random_amount(rng),
                        },
                        3..=5 => PlannedOp::Withdraw {
                            account,
                            amount: random_amount(rng),
                        },
                        _ if accounts > 1 => {
                            let mut to = rng.gen_range(0..accounts);
                            while to == account {
                                to = rng.gen_range(0..accounts);
                            }
                            PlannedOp::Transfer {
                                from: account,
                                to,
                                amount: random_amount(rng),
                            }
                        }
                        _ => PlannedOp::Deposit {
                            account,
                            amount: random_amount(rng),
                        },
                    }
                }
            })
            .collect()
    }
}

/// Between 0.01 and 100.00.
fn random_amount(rng: &mut StdRng) -> Decimal {
    Decimal::new(rng.gen_range(1..=10_000), 2)
}
