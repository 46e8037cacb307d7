//! Decimal money helpers: posting sides and base/foreign currency translation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::CurrencyId;

/// Debit or credit side of a posting.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }

    pub fn is_debit(self) -> bool {
        matches!(self, Side::Debit)
    }
}

/// A non-negative amount pinned to a side.
///
/// Built from a signed value and the side it naturally posts on: negative values
/// land on the opposite side so stored amounts are never negative.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SignedAmount {
    pub side: Side,
    pub amount: Decimal,
}

impl SignedAmount {
    pub fn on(natural: Side, value: Decimal) -> Self {
        if value.is_sign_negative() && !value.is_zero() {
            Self {
                side: natural.opposite(),
                amount: -value,
            }
        } else {
            Self {
                side: natural,
                amount: value.abs(),
            }
        }
    }
}

/// Document currency when it differs from the business base currency.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignCurrency {
    pub currency_id: CurrencyId,
    pub exchange_rate: Decimal,
}

/// Base and (optional) foreign value of one stated document amount.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TranslatedAmount {
    pub base: Decimal,
    pub foreign: Option<Decimal>,
}

/// Currency rule for a single document.
///
/// When the document is in the base currency, stated amounts are base amounts and
/// no foreign amount exists. Otherwise stated amounts are foreign amounts and the
/// base amount is `foreign * exchange_rate`, computed exactly (no rounding) so that
/// each currency balances on its own.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CurrencyTranslation {
    base_currency: CurrencyId,
    foreign: Option<ForeignCurrency>,
}

impl CurrencyTranslation {
    pub fn base_only(base_currency: CurrencyId) -> Self {
        Self {
            base_currency,
            foreign: None,
        }
    }

    pub fn resolve(
        base_currency: CurrencyId,
        document_currency: Option<CurrencyId>,
        exchange_rate: Decimal,
    ) -> DomainResult<Self> {
        match document_currency {
            Some(currency_id) if currency_id != base_currency => {
                if exchange_rate <= Decimal::ZERO {
                    return Err(DomainError::validation(format!(
                        "exchange rate must be positive for foreign currency {currency_id} (got {exchange_rate})"
                    )));
                }
                Ok(Self {
                    base_currency,
                    foreign: Some(ForeignCurrency {
                        currency_id,
                        exchange_rate,
                    }),
                })
            }
            _ => Ok(Self::base_only(base_currency)),
        }
    }

    pub fn base_currency(&self) -> CurrencyId {
        self.base_currency
    }

    pub fn foreign(&self) -> Option<ForeignCurrency> {
        self.foreign
    }

    pub fn foreign_currency(&self) -> Option<CurrencyId> {
        self.foreign.map(|f| f.currency_id)
    }

    /// Rate recorded on postings (1 for base-currency documents).
    pub fn exchange_rate(&self) -> Decimal {
        self.foreign.map(|f| f.exchange_rate).unwrap_or(Decimal::ONE)
    }

    /// Fails with `Validation` when `stated * rate` overflows.
    pub fn translate(&self, stated: Decimal) -> DomainResult<TranslatedAmount> {
        match self.foreign {
            None => Ok(TranslatedAmount {
                base: stated,
                foreign: None,
            }),
            Some(f) => {
                let base = stated.checked_mul(f.exchange_rate).ok_or_else(|| {
                    DomainError::validation(format!(
                        "{stated} at rate {} overflows the base amount",
                        f.exchange_rate
                    ))
                })?;
                Ok(TranslatedAmount {
                    base,
                    foreign: Some(stated),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn negative_amount_flips_side() {
        let a = SignedAmount::on(Side::Debit, dec!(-12.50));
        assert_eq!(a.side, Side::Credit);
        assert_eq!(a.amount, dec!(12.50));

        let b = SignedAmount::on(Side::Credit, dec!(3));
        assert_eq!(b.side, Side::Credit);
        assert_eq!(b.amount, dec!(3));
    }

    #[test]
    fn same_currency_has_no_foreign_amount() {
        let base = CurrencyId::new();
        let t = CurrencyTranslation::resolve(base, Some(base), dec!(0)).unwrap();
        assert_eq!(t.foreign_currency(), None);
        assert_eq!(t.exchange_rate(), Decimal::ONE);
        assert_eq!(
            t.translate(dec!(110)).unwrap(),
            TranslatedAmount {
                base: dec!(110),
                foreign: None
            }
        );
    }

    #[test]
    fn foreign_amount_is_translated_by_rate() {
        let base = CurrencyId::new();
        let usd = CurrencyId::new();
        let t = CurrencyTranslation::resolve(base, Some(usd), dec!(1.25)).unwrap();
        let out = t.translate(dec!(40)).unwrap();
        assert_eq!(out.base, dec!(50.00));
        assert_eq!(out.foreign, Some(dec!(40)));
        assert_eq!(t.foreign_currency(), Some(usd));
    }

    #[test]
    fn overflowing_translation_is_a_validation_error() {
        let t = CurrencyTranslation::resolve(CurrencyId::new(), Some(CurrencyId::new()), dec!(1000))
            .unwrap();
        let err = t.translate(Decimal::MAX).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn foreign_currency_requires_positive_rate() {
        let err = CurrencyTranslation::resolve(CurrencyId::new(), Some(CurrencyId::new()), dec!(0))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
