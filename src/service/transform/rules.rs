//! Per-type layout rules for the canonical payload.

use crate::domain::DocumentType;

/// Which optional header fields of `IdentificacionDocumento` are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderRules {
    /// `IndicadorMontoGravado`.
    pub gross_indicator: bool,
    /// `IndicadorEnvioDiferido` = `1`.
    pub deferred_send: bool,
    /// `IndicadorNotaCredito` = `0`.
    pub credit_note_indicator: bool,
    /// `TipoIngresos`.
    pub income_type: Option<&'static str>,
    /// `TipoPago` = `1`.
    pub payment_type: bool,
    /// `TablaFormasPago` with a single cash row.
    pub payment_forms: bool,
}

/// Layout of the `Totales` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalsLayout {
    /// Standard camelCase totals.
    Standard,
    /// Standard plus the amount payable.
    SpecialRegime,
    /// Standard plus amount payable and withheld taxes.
    Withholding,
    /// Exempt amount and total only.
    Minimal,
    /// PascalCase totals with ITBIS added to the total.
    Government,
}

/// Everything that varies by document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentRules {
    /// `FechaVencimientoSecuencia` is written.
    pub due_date: bool,
    /// Header fields.
    pub header: HeaderRules,
    /// Extended issuer and buyer fields.
    pub extended_parties: bool,
    /// Buyer block present.
    pub buyer: bool,
    /// `informacionesAdicionales` present.
    pub additional_info: bool,
    /// `InformacionReferencia` required.
    pub reference: bool,
    /// Per-line `retencion` block.
    pub withholding: bool,
    /// Totals layout.
    pub totals: TotalsLayout,
    /// `DescuentosORecargos` written as `[]` when there are no discounts.
    pub empty_adjustments: bool,
}

const BASE_HEADER: HeaderRules = HeaderRules {
    gross_indicator: false,
    deferred_send: false,
    credit_note_indicator: false,
    income_type: None,
    payment_type: false,
    payment_forms: false,
};

const BASE: DocumentRules = DocumentRules {
    due_date: true,
    header: BASE_HEADER,
    extended_parties: false,
    buyer: true,
    additional_info: false,
    reference: false,
    withholding: false,
    totals: TotalsLayout::Standard,
    empty_adjustments: false,
};

/// Rule row for `document_type`.
#[must_use]
pub const fn rules_for(document_type: DocumentType) -> DocumentRules {
    match document_type {
        DocumentType::TaxCreditInvoice | DocumentType::ConsumerInvoice => DocumentRules {
            due_date: document_type.requires_expiration(),
            header: HeaderRules {
                gross_indicator: true,
                deferred_send: true,
                income_type: Some("01"),
                payment_type: true,
                payment_forms: true,
                ..BASE_HEADER
            },
            extended_parties: true,
            additional_info: true,
            ..BASE
        },
        DocumentType::DebitNote => DocumentRules {
            header: HeaderRules {
                gross_indicator: true,
                income_type: Some("03"),
                payment_type: true,
                payment_forms: true,
                ..BASE_HEADER
            },
            extended_parties: true,
            additional_info: true,
            reference: true,
            ..BASE
        },
        DocumentType::CreditNote => DocumentRules {
            due_date: false,
            header: HeaderRules {
                gross_indicator: true,
                credit_note_indicator: true,
                income_type: Some("01"),
                payment_type: true,
                ..BASE_HEADER
            },
            extended_parties: true,
            additional_info: true,
            reference: true,
            ..BASE
        },
        DocumentType::Purchase => DocumentRules {
            header: HeaderRules {
                gross_indicator: true,
                payment_type: true,
                payment_forms: true,
                ..BASE_HEADER
            },
            withholding: true,
            totals: TotalsLayout::Withholding,
            ..BASE
        },
        DocumentType::MinorExpenses => DocumentRules {
            buyer: false,
            totals: TotalsLayout::Minimal,
            ..BASE
        },
        DocumentType::SpecialRegime => DocumentRules {
            header: HeaderRules {
                income_type: Some("01"),
                payment_type: true,
                payment_forms: true,
                ..BASE_HEADER
            },
            totals: TotalsLayout::SpecialRegime,
            ..BASE
        },
        DocumentType::Government => DocumentRules {
            header: HeaderRules {
                gross_indicator: true,
                income_type: Some("01"),
                payment_type: true,
                ..BASE_HEADER
            },
            totals: TotalsLayout::Government,
            empty_adjustments: true,
            ..BASE
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_date_follows_expiration_requirement() {
        for document_type in DocumentType::ALL {
            assert_eq!(
                rules_for(document_type).due_date,
                document_type.requires_expiration(),
                "type {document_type}"
            );
        }
    }

    #[test]
    fn test_reference_only_for_notes() {
        for document_type in DocumentType::ALL {
            assert_eq!(rules_for(document_type).reference, document_type.is_note());
        }
    }

    #[test]
    fn test_minor_expenses_is_bare() {
        let rules = rules_for(DocumentType::MinorExpenses);
        assert!(!rules.buyer);
        assert_eq!(rules.header, BASE_HEADER);
        assert_eq!(rules.totals, TotalsLayout::Minimal);
    }

    #[test]
    fn test_income_types() {
        assert_eq!(rules_for(DocumentType::DebitNote).header.income_type, Some("03"));
        assert_eq!(rules_for(DocumentType::Purchase).header.income_type, None);
        assert!(rules_for(DocumentType::ConsumerInvoice).header.deferred_send);
        assert!(!rules_for(DocumentType::Government).header.payment_forms);
    }
}
