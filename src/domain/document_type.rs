//! Electronic fiscal document types (e-CF).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The eight e-CF document types accepted by the tax authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentType {
    /// 31 - Tax credit invoice.
    TaxCreditInvoice,
    /// 32 - Final consumer invoice.
    ConsumerInvoice,
    /// 33 - Debit note.
    DebitNote,
    /// 34 - Credit note.
    CreditNote,
    /// 41 - Purchase voucher.
    Purchase,
    /// 43 - Minor expenses.
    MinorExpenses,
    /// 44 - Special tax regime.
    SpecialRegime,
    /// 45 - Government.
    Government,
}

impl DocumentType {
    /// All document types in code order.
    pub const ALL: [Self; 8] = [
        Self::TaxCreditInvoice,
        Self::ConsumerInvoice,
        Self::DebitNote,
        Self::CreditNote,
        Self::Purchase,
        Self::MinorExpenses,
        Self::SpecialRegime,
        Self::Government,
    ];

    /// Numeric code used on the wire and inside document numbers.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::TaxCreditInvoice => 31,
            Self::ConsumerInvoice => 32,
            Self::DebitNote => 33,
            Self::CreditNote => 34,
            Self::Purchase => 41,
            Self::MinorExpenses => 43,
            Self::SpecialRegime => 44,
            Self::Government => 45,
        }
    }

    /// Look up a type by numeric code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            31 => Some(Self::TaxCreditInvoice),
            32 => Some(Self::ConsumerInvoice),
            33 => Some(Self::DebitNote),
            34 => Some(Self::CreditNote),
            41 => Some(Self::Purchase),
            43 => Some(Self::MinorExpenses),
            44 => Some(Self::SpecialRegime),
            45 => Some(Self::Government),
            _ => None,
        }
    }

    /// Whether numbers of this type carry a sequence expiration date.
    ///
    /// Consumer invoices and credit notes never expire; every other type does.
    #[must_use]
    pub const fn requires_expiration(self) -> bool {
        !matches!(self, Self::ConsumerInvoice | Self::CreditNote)
    }

    /// Whether the buyer must be identified by tax ID.
    #[must_use]
    pub const fn requires_buyer_tax_id(self) -> bool {
        !matches!(self, Self::ConsumerInvoice)
    }

    /// Debit and credit notes modify a previously issued document.
    #[must_use]
    pub const fn is_note(self) -> bool {
        matches!(self, Self::DebitNote | Self::CreditNote)
    }

    /// Two-digit code as a string (`"31"`).
    #[must_use]
    pub fn as_code_str(self) -> String {
        format!("{:02}", self.code())
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.code())
    }
}

/// Error returned when a document type code is not one of the accepted eight.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown document type '{0}', expected one of 31, 32, 33, 34, 41, 43, 44, 45")]
pub struct UnknownDocumentType(pub String);

impl FromStr for DocumentType {
    type Err = UnknownDocumentType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('E')
            .or_else(|| trimmed.strip_prefix('e'))
            .unwrap_or(trimmed);
        digits
            .parse::<u8>()
            .ok()
            .and_then(Self::from_code)
            .ok_or_else(|| UnknownDocumentType(s.to_string()))
    }
}

impl TryFrom<u8> for DocumentType {
    type Error = UnknownDocumentType;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| UnknownDocumentType(code.to_string()))
    }
}

impl Serialize for DocumentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for DocumentType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(u8),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Code(code) => Self::try_from(code).map_err(serde::de::Error::custom),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for document_type in DocumentType::ALL {
            assert_eq!(
                DocumentType::from_code(document_type.code()),
                Some(document_type)
            );
        }
        assert_eq!(DocumentType::from_code(46), None);
    }

    #[test]
    fn test_expiration_requirement() {
        let without: Vec<_> = DocumentType::ALL
            .into_iter()
            .filter(|t| !t.requires_expiration())
            .map(DocumentType::code)
            .collect();
        assert_eq!(without, vec![32, 34]);
    }

    #[test]
    fn test_parse_accepts_text_and_prefix() {
        assert_eq!("31".parse(), Ok(DocumentType::TaxCreditInvoice));
        assert_eq!("E45".parse(), Ok(DocumentType::Government));
        assert!("46".parse::<DocumentType>().is_err());
        assert!("abc".parse::<DocumentType>().is_err());
    }

    #[test]
    fn test_serde_accepts_number_or_string() {
        let from_number: DocumentType = serde_json::from_str("32").unwrap();
        let from_text: DocumentType = serde_json::from_str("\"32\"").unwrap();
        assert_eq!(from_number, DocumentType::ConsumerInvoice);
        assert_eq!(from_text, DocumentType::ConsumerInvoice);
        assert_eq!(serde_json::to_string(&from_text).unwrap(), "32");
        assert!(serde_json::from_str::<DocumentType>("99").is_err());
    }
}
