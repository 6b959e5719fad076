//! Account-chart configuration for the Turkish uniform chart of accounts
//! (Tekdüzen Hesap Planı).
//!
//! Every account-prefix rule the engine applies lives here as data, not as
//! inlined logic, so a non-default chart can be supplied per run. The
//! default tables reproduce the enumerated prefixes only; no further
//! semantics are inferred from them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Account-prefix tables driving matching, compliance, and filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountChart {
    /// Deductible input VAT accounts (191 İndirilecek KDV).
    pub vat_input_prefixes: Vec<String>,
    /// Output VAT accounts (391 Hesaplanan KDV).
    pub vat_output_prefixes: Vec<String>,
    /// Amount-of-record priority for Kebir sources: when one document number
    /// is posted to several accounts, the highest-priority account's figure
    /// becomes the group total. Control accounts (320 Satıcılar, 120
    /// Alıcılar) outrank cash/bank (100, 102), then loans (300) and order
    /// advances (159).
    pub amount_priority: Vec<(String, u8)>,
    /// Sales revenue accounts expected on outgoing invoices (600/601/602).
    pub sales_revenue_prefixes: Vec<String>,
    /// Settlement accounts expected on outgoing invoices (120/100/102).
    pub sales_settlement_prefixes: Vec<String>,
    /// Settlement accounts expected on incoming invoices (320/100/102).
    pub purchase_settlement_prefixes: Vec<String>,
    /// Sales-leg accounts expected on self-issued invoices (600/601/391).
    pub self_sales_prefixes: Vec<String>,
    /// Purchase-leg accounts expected on self-issued invoices
    /// (150-153 inventory, 770 overhead, 191 input VAT).
    pub self_purchase_prefixes: Vec<String>,
    /// Prefixes whose presence makes an unmatched posting group a candidate
    /// "undocumented invoice" (income/expense/inventory/fixed-asset plus the
    /// control and VAT accounts).
    pub undocumented_critical_prefixes: Vec<String>,
    /// Prefixes for pure cash/bank/payroll/tax-remittance movements that do
    /// not require an invoice; such groups are discarded unless a VAT
    /// account is also present.
    pub undocumented_excluded_prefixes: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for AccountChart {
    fn default() -> Self {
        Self {
            vat_input_prefixes: strings(&["191"]),
            vat_output_prefixes: strings(&["391"]),
            amount_priority: vec![
                ("320".into(), 100),
                ("120".into(), 100),
                ("100".into(), 80),
                ("102".into(), 80),
                ("300".into(), 70),
                ("159".into(), 60),
            ],
            sales_revenue_prefixes: strings(&["600", "601", "602"]),
            sales_settlement_prefixes: strings(&["120", "100", "102"]),
            purchase_settlement_prefixes: strings(&["320", "100", "102"]),
            self_sales_prefixes: strings(&["600", "601", "391"]),
            self_purchase_prefixes: strings(&["150", "151", "152", "153", "770", "191"]),
            undocumented_critical_prefixes: strings(&[
                "6", "7", "15", "25", "320", "120", "191", "391",
            ]),
            undocumented_excluded_prefixes: strings(&[
                "100", "101", "102", "103", "108", "121", "159", "300", "321", "335", "360",
                "361", "645", "646", "656", "780",
            ]),
        }
    }
}

impl AccountChart {
    /// Whether the account is a VAT input or output account.
    pub fn is_vat_account(&self, account: &str) -> bool {
        starts_with_any(account, &self.vat_input_prefixes)
            || starts_with_any(account, &self.vat_output_prefixes)
    }

    /// Priority rank for amount-of-record selection; 0 for unranked accounts.
    pub fn amount_priority(&self, account: &str) -> u8 {
        self.amount_priority
            .iter()
            .filter(|(prefix, _)| account.starts_with(prefix.as_str()))
            .map(|&(_, rank)| rank)
            .max()
            .unwrap_or(0)
    }

    /// Whether any account in the set carries one of the given prefixes.
    pub fn set_has_prefix(accounts: &BTreeSet<String>, prefixes: &[String]) -> bool {
        accounts
            .iter()
            .any(|a| starts_with_any(a, prefixes))
    }
}

fn starts_with_any(account: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|p| account.starts_with(p.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vat_accounts() {
        let chart = AccountChart::default();
        assert!(chart.is_vat_account("191.01.001"));
        assert!(chart.is_vat_account("391"));
        assert!(!chart.is_vat_account("320.01"));
    }

    #[test]
    fn priority_ranking() {
        let chart = AccountChart::default();
        assert_eq!(chart.amount_priority("320.01.001"), 100);
        assert_eq!(chart.amount_priority("120"), 100);
        assert_eq!(chart.amount_priority("102.05"), 80);
        assert_eq!(chart.amount_priority("159.01"), 60);
        assert_eq!(chart.amount_priority("770.00"), 0);
    }

    #[test]
    fn prefix_set_lookup() {
        let chart = AccountChart::default();
        let accounts: BTreeSet<String> =
            ["600.01".to_string(), "391.18".to_string()].into_iter().collect();
        assert!(AccountChart::set_has_prefix(
            &accounts,
            &chart.sales_revenue_prefixes
        ));
        assert!(!AccountChart::set_has_prefix(
            &accounts,
            &chart.purchase_settlement_prefixes
        ));
    }
}
