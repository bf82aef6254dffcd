//! Simplified invoice as sent by billing front ends.
//!
//! Field names follow the JSON the front ends already produce, so the
//! structure is deliberately permissive: most fields are optional and the
//! transformer decides what is required for each document type.

use serde::Deserialize;

use super::money::Scalar;

/// Invoice in the simplified input format.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimplifiedInvoice {
    /// Issuer data.
    #[serde(default)]
    pub emisor: IssuerInput,
    /// Buyer data; absent for anonymous consumer invoices.
    #[serde(default)]
    pub comprador: Option<BuyerInput>,
    /// Document header.
    #[serde(default)]
    pub factura: InvoiceHeaderInput,
    /// Line items.
    #[serde(default)]
    pub items: Vec<LineItemInput>,
    /// Returned items of a credit note, used in place of `items`.
    #[serde(default, rename = "ItemsDevueltos")]
    pub returned_items: Vec<ReturnedItemInput>,
    /// Reference to the modified document (debit and credit notes).
    #[serde(default)]
    pub modificacion: Option<ModificationInput>,
    /// Discounts in the legacy layout.
    #[serde(default)]
    pub descuentos: Option<DiscountInput>,
    /// Discounts in the current layout.
    #[serde(default, rename = "DescuentosORecargos")]
    pub adjustments: Option<AdjustmentsInput>,
}

/// Issuer section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerInput {
    /// Issuer tax ID.
    #[serde(default)]
    pub rnc: Option<Scalar>,
    /// Legal name.
    #[serde(default)]
    pub razon_social: Option<String>,
    /// Street address.
    #[serde(default)]
    pub direccion: Option<String>,
    /// Municipality code.
    #[serde(default)]
    pub municipio: Option<String>,
    /// Province code.
    #[serde(default)]
    pub provincia: Option<String>,
    /// Phone numbers.
    #[serde(default)]
    pub telefono: Vec<String>,
    /// Contact email.
    #[serde(default)]
    pub correo: Option<String>,
    /// Web site.
    #[serde(default)]
    pub web_site: Option<String>,
}

/// Buyer section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerInput {
    /// Buyer tax ID.
    #[serde(default)]
    pub rnc: Option<Scalar>,
    /// Buyer name.
    #[serde(default)]
    pub nombre: Option<String>,
    /// Buyer email.
    #[serde(default)]
    pub correo: Option<String>,
    /// Buyer address.
    #[serde(default)]
    pub direccion: Option<String>,
    /// Municipality code.
    #[serde(default)]
    pub municipio: Option<String>,
    /// Province code.
    #[serde(default)]
    pub provincia: Option<String>,
    /// Delivery date.
    #[serde(default)]
    pub fecha_entrega: Option<String>,
    /// Order date.
    #[serde(default)]
    pub fecha_orden: Option<String>,
    /// Order number.
    #[serde(default)]
    pub numero_orden: Option<Scalar>,
    /// Internal buyer code.
    #[serde(default)]
    pub codigo_interno: Option<Scalar>,
}

/// Document header section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceHeaderInput {
    /// Document number (e.g. `E310000000001`).
    #[serde(default)]
    pub ncf: Option<String>,
    /// Document type code.
    #[serde(default)]
    pub tipo: Option<Scalar>,
    /// Issue date.
    #[serde(default)]
    pub fecha: Option<String>,
    /// Declared grand total.
    #[serde(default)]
    pub total: Option<Scalar>,
    /// Internal invoice identifier.
    #[serde(default)]
    pub id: Option<Scalar>,
    /// Sequence expiration date.
    #[serde(default, rename = "fechaVencNCF")]
    pub fecha_venc_ncf: Option<String>,
    /// Container number.
    #[serde(default)]
    pub numero_contenedor: Option<String>,
    /// Modified document number, inline form.
    #[serde(default)]
    pub ncf_modificado: Option<String>,
    /// Modified document date, inline form.
    #[serde(default, rename = "fechaNCFModificado")]
    pub fecha_ncf_modificado: Option<String>,
    /// Modification code, inline form.
    #[serde(default)]
    pub codigo_modificacion: Option<Scalar>,
    /// Modification reason, inline form.
    #[serde(default)]
    pub razon_modificacion: Option<String>,
}

/// One invoice line. `precio` is the line amount.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemInput {
    /// Item name.
    #[serde(default)]
    pub nombre: Option<String>,
    /// Item description.
    #[serde(default)]
    pub descripcion: Option<String>,
    /// Line amount.
    #[serde(default)]
    pub precio: Option<Scalar>,
    /// Quantity, informational.
    #[serde(default)]
    pub cantidad: Option<Scalar>,
    /// Unit of measure code.
    #[serde(default)]
    pub unidad_medida: Option<Scalar>,
    /// 1 = good, 2 = service.
    #[serde(default)]
    pub indicador_bieno_servicio: Option<Scalar>,
    /// Taxable flag.
    #[serde(default)]
    pub itbis: Option<Scalar>,
    /// Taxable flag, alternative name.
    #[serde(default)]
    pub gravado: Option<Scalar>,
}

impl LineItemInput {
    /// Lines are exempt unless explicitly flagged taxable.
    #[must_use]
    pub fn is_taxable(&self) -> bool {
        self.itbis.as_ref().is_some_and(Scalar::is_true)
            || self.gravado.as_ref().is_some_and(Scalar::is_true)
    }
}

/// Returned item of a credit note.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnedItemInput {
    /// Item name.
    #[serde(default)]
    pub nombre: Option<String>,
    /// Amount to credit.
    #[serde(default)]
    pub monto_acreditar: Option<Scalar>,
    /// Original price, used when no credit amount is given.
    #[serde(default)]
    pub precio: Option<Scalar>,
}

/// Reference to the document a note modifies.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModificationInput {
    /// Modified document number.
    #[serde(default, rename = "NCFModificado")]
    pub ncf_modificado: Option<String>,
    /// Modified document date.
    #[serde(default, rename = "FechaNCFModificado")]
    pub fecha_ncf_modificado: Option<String>,
    /// Modification code (1-4).
    #[serde(default, rename = "CodigoModificacion")]
    pub codigo_modificacion: Option<Scalar>,
    /// Free-text reason.
    #[serde(default, rename = "RazonModificacion")]
    pub razon_modificacion: Option<String>,
}

/// Discounts, either a list or a single global discount.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DiscountInput {
    /// Itemized discounts, fixed amounts.
    List(Vec<DiscountEntry>),
    /// One global discount, fixed amount or percentage.
    Global(DiscountEntry),
}

/// The `DescuentosORecargos` wrapper.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdjustmentsInput {
    /// Discounts.
    #[serde(default, rename = "Descuentos")]
    pub descuentos: Option<DiscountInput>,
}

/// One discount. The amount may arrive under several names.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscountEntry {
    /// Amount, current layout.
    #[serde(default, rename = "Monto")]
    pub monto_upper: Option<Scalar>,
    /// Amount, legacy layout.
    #[serde(default)]
    pub monto: Option<Scalar>,
    /// Amount, alternative name.
    #[serde(default)]
    pub valor: Option<Scalar>,
    /// Percentage of the grand total (global discounts only).
    #[serde(default)]
    pub porcentaje: Option<Scalar>,
    /// Description, current layout.
    #[serde(default, rename = "Descripcion")]
    pub descripcion_upper: Option<String>,
    /// Description, legacy layout.
    #[serde(default)]
    pub descripcion: Option<String>,
    /// Description, alternative name.
    #[serde(default)]
    pub concepto: Option<String>,
    /// Billing indicator of the discount line.
    #[serde(default, rename = "indicadorFacturacion")]
    pub indicador_facturacion: Option<Scalar>,
}

impl DiscountEntry {
    /// First amount field that is present.
    #[must_use]
    pub fn raw_amount(&self) -> Option<&Scalar> {
        self.monto_upper
            .as_ref()
            .or(self.monto.as_ref())
            .or(self.valor.as_ref())
    }

    /// First non-empty description.
    #[must_use]
    pub fn description(&self) -> Option<String> {
        [&self.descripcion_upper, &self.descripcion, &self.concepto]
            .into_iter()
            .flatten()
            .map(|text| text.trim())
            .find(|text| !text.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_credit_note_layout() {
        let json = r#"{
            "emisor": {"rnc": "130000001", "razonSocial": "Clinica"},
            "factura": {"ncf": "E340000000001", "tipo": "34", "total": "1,000.00"},
            "ItemsDevueltos": [{"nombre": "Consulta", "montoAcreditar": 1000}],
            "modificacion": {
                "NCFModificado": "E310000000005",
                "FechaNCFModificado": "01-02-2026",
                "CodigoModificacion": "03",
                "RazonModificacion": "Devolucion"
            },
            "DescuentosORecargos": {"Descuentos": [{"Monto": "50", "Descripcion": "Promo"}]}
        }"#;

        let invoice: SimplifiedInvoice = serde_json::from_str(json).unwrap();
        assert_eq!(invoice.returned_items.len(), 1);
        assert!(invoice.items.is_empty());
        assert_eq!(
            invoice.modificacion.unwrap().ncf_modificado.as_deref(),
            Some("E310000000005")
        );
        let Some(DiscountInput::List(entries)) = invoice.adjustments.unwrap().descuentos else {
            panic!("expected discount list");
        };
        assert_eq!(entries[0].description().as_deref(), Some("Promo"));
    }

    #[test]
    fn test_global_discount_and_taxable_flags() {
        let json = r#"{
            "items": [{"precio": 10, "itbis": true}, {"precio": 5, "gravado": "true"}],
            "descuentos": {"porcentaje": 10}
        }"#;
        let invoice: SimplifiedInvoice = serde_json::from_str(json).unwrap();
        assert!(invoice.items[0].is_taxable());
        assert!(!invoice.items[1].is_taxable());
        assert!(matches!(invoice.descuentos, Some(DiscountInput::Global(_))));
    }
}
