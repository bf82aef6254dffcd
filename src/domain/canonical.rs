//! Canonical e-CF payload accepted by the certification service.
//!
//! Casing is mixed on purpose: the service expects PascalCase for most
//! blocks and camelCase for the buyer, additional info and standard totals.

use serde::Serialize;

use super::money::Money;

/// The full submission body.
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalInvoice {
    /// Bearer token of the certification session.
    #[serde(rename = "Token")]
    pub token: String,
    /// The document itself.
    #[serde(rename = "DocumentoElectronico")]
    pub document: ElectronicDocument,
    /// Computed amounts, kept for callers and never sent.
    #[serde(skip)]
    pub summary: AmountSummary,
}

/// Amounts derived while building the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AmountSummary {
    /// Exempt amount after discounts.
    pub exempt: Money,
    /// Taxable amount after discounts.
    pub taxable: Money,
    /// ITBIS on the taxable amount.
    pub tax: Money,
    /// Sum of line amounts after discounts.
    pub net_total: Money,
    /// Total discount applied.
    pub discount_total: Money,
    /// Total as written in the payload's totals block.
    pub reported_total: Money,
}

/// `DocumentoElectronico`.
#[derive(Debug, Clone, Serialize)]
pub struct ElectronicDocument {
    /// Header.
    #[serde(rename = "Encabezado")]
    pub header: DocumentHeader,
    /// Lines.
    #[serde(rename = "DetallesItems")]
    pub items: Vec<ItemLine>,
    /// Discount lines.
    #[serde(rename = "DescuentosORecargos", skip_serializing_if = "Option::is_none")]
    pub adjustments: Option<Vec<AdjustmentLine>>,
    /// Reference to the modified document.
    #[serde(
        rename = "InformacionReferencia",
        skip_serializing_if = "Option::is_none"
    )]
    pub reference: Option<ReferenceInfo>,
}

/// `Encabezado`.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentHeader {
    /// Document identification.
    #[serde(rename = "IdentificacionDocumento")]
    pub identification: DocumentIdentification,
    /// Issuer.
    #[serde(rename = "Emisor")]
    pub issuer: Issuer,
    /// Buyer, absent for minor-expense vouchers.
    #[serde(rename = "comprador", skip_serializing_if = "Option::is_none")]
    pub buyer: Option<Buyer>,
    /// Extra references.
    #[serde(
        rename = "informacionesAdicionales",
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_info: Option<AdditionalInfo>,
    /// Totals.
    #[serde(rename = "Totales")]
    pub totals: Totals,
}

/// `IdentificacionDocumento`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DocumentIdentification {
    /// Two-digit type code.
    pub tipo_documento: String,
    /// Document number.
    #[serde(rename = "NCF")]
    pub ncf: String,
    /// Sequence expiration date, `DD-MM-YYYY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fecha_vencimiento_secuencia: Option<String>,
    /// `1` when any amount is taxable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicador_monto_gravado: Option<String>,
    /// Deferred-send indicator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicador_envio_diferido: Option<String>,
    /// Credit-note indicator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicador_nota_credito: Option<String>,
    /// Income type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo_ingresos: Option<String>,
    /// Payment type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo_pago: Option<String>,
    /// Payment forms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tabla_formas_pago: Option<Vec<PaymentForm>>,
}

/// One row of `TablaFormasPago`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PaymentForm {
    /// Payment form code.
    pub forma: String,
    /// Amount paid with this form.
    pub monto: Money,
}

/// `Emisor`. The extended fields only appear for types 31 to 34.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Issuer {
    /// Tax ID.
    #[serde(rename = "RNC")]
    pub rnc: Option<String>,
    /// Legal name.
    #[serde(rename = "RazonSocial")]
    pub razon_social: Option<String>,
    /// Address.
    #[serde(rename = "Direccion")]
    pub direccion: Option<String>,
    /// Municipality.
    #[serde(rename = "Municipio")]
    pub municipio: Option<String>,
    /// Province.
    #[serde(rename = "Provincia")]
    pub provincia: Option<String>,
    /// Phone numbers.
    #[serde(rename = "TablaTelefono")]
    pub tabla_telefono: Vec<String>,
    /// Issue date, `DD-MM-YYYY`.
    #[serde(rename = "FechaEmision")]
    pub fecha_emision: String,
    /// Extended issuer fields.
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub extended: Option<IssuerExtension>,
}

/// Extra issuer fields.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerExtension {
    pub nombre_comercial: Option<String>,
    pub correo: Option<String>,
    pub web_site: Option<String>,
    pub codigo_vendedor: Option<String>,
    pub numero_factura_interna: Option<String>,
    pub numero_pedido_interno: Option<String>,
    pub zona_venta: String,
}

/// `comprador`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Buyer {
    /// Tax ID; always null for consumer invoices.
    pub rnc: Option<String>,
    /// Name.
    pub razon_social: Option<String>,
    pub correo: Option<String>,
    pub direccion: Option<String>,
    pub municipio: Option<String>,
    pub provincia: Option<String>,
    /// Extended buyer fields.
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub extended: Option<BuyerExtension>,
}

/// Extra buyer fields.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerExtension {
    pub contacto: Option<String>,
    /// `SI` when an email is on file.
    pub envio_mail: String,
    pub fecha_entrega: Option<String>,
    pub fecha_orden: Option<String>,
    pub numero_orden: Option<String>,
    pub codigo_interno: Option<String>,
}

/// `informacionesAdicionales`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalInfo {
    pub numero_contenedor: Option<String>,
    pub numero_referencia: Option<String>,
}

/// `Totales`, in one of three layouts.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Totals {
    /// Types 31, 32, 33, 34, 41 and 44.
    Standard(StandardTotals),
    /// Minor expenses (43).
    Minimal(MinimalTotals),
    /// Government (45).
    Government(GovernmentTotals),
}

impl Totals {
    /// Grand total written in the payload.
    #[must_use]
    pub const fn grand_total(&self) -> Money {
        match self {
            Self::Standard(totals) => totals.monto_total,
            Self::Minimal(totals) => totals.monto_total,
            Self::Government(totals) => totals.monto_total,
        }
    }
}

/// Standard camelCase totals. Tax fields are null when nothing is taxable.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardTotals {
    pub monto_gravado_total: Option<Money>,
    #[serde(rename = "montoGravadoI1")]
    pub monto_gravado_i1: Option<Money>,
    #[serde(rename = "itbiS1")]
    pub itbis1: Option<String>,
    #[serde(rename = "totalITBIS")]
    pub total_itbis: Option<Money>,
    #[serde(rename = "totalITBIS1")]
    pub total_itbis1: Option<Money>,
    pub monto_total: Money,
    pub monto_exento: Option<Money>,
    /// Amount payable (41, 44).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valor_pagar: Option<Money>,
    /// Withheld ITBIS (41).
    #[serde(rename = "totalITBISRetenido", skip_serializing_if = "Option::is_none")]
    pub total_itbis_retenido: Option<Money>,
    /// Withheld income tax (41).
    #[serde(rename = "totalISRRetencion", skip_serializing_if = "Option::is_none")]
    pub total_isr_retencion: Option<Money>,
}

/// Minimal totals: everything is exempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinimalTotals {
    pub monto_exento: Money,
    pub monto_total: Money,
}

/// Government totals in PascalCase; the total includes ITBIS.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GovernmentTotals {
    pub monto_total: Money,
    pub valor_pagar: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monto_gravado_total: Option<Money>,
    #[serde(rename = "ITBIS1", skip_serializing_if = "Option::is_none")]
    pub itbis1: Option<String>,
    #[serde(rename = "TotalITBIS", skip_serializing_if = "Option::is_none")]
    pub total_itbis: Option<Money>,
    #[serde(rename = "TotalITBIS1", skip_serializing_if = "Option::is_none")]
    pub total_itbis1: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monto_exento: Option<Money>,
}

/// One row of `DetallesItems`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemLine {
    /// One-based line number.
    pub numero_linea: String,
    /// `1` taxable, `4` exempt.
    pub indicador_facturacion: String,
    /// Withholding, purchase vouchers only.
    #[serde(rename = "retencion", skip_serializing_if = "Option::is_none")]
    pub retencion: Option<Withholding>,
    pub nombre: Option<String>,
    pub indicador_bieno_servicio: String,
    pub descripcion: Option<String>,
    pub cantidad: String,
    pub unidad_medida: String,
    pub precio_unitario: Money,
    pub monto: Money,
}

impl ItemLine {
    /// Whether the line is taxable.
    #[must_use]
    pub fn is_taxable(&self) -> bool {
        self.indicador_facturacion == "1"
    }
}

/// Per-line withholding block.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Withholding {
    pub indicador_agente: String,
    #[serde(rename = "montoITBIS")]
    pub monto_itbis: Money,
    #[serde(rename = "montoISR")]
    pub monto_isr: Money,
}

/// One row of `DescuentosORecargos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdjustmentLine {
    pub numero_linea: String,
    /// `D` for discount.
    pub tipo_ajuste: String,
    pub indicador_facturacion: String,
    pub descripcion: String,
    /// `$` fixed amount, `%` percentage.
    pub tipo_valor: String,
    /// Percentage or amount, as declared.
    pub valor: Money,
    /// Resulting amount.
    pub monto: Money,
}

/// `InformacionReferencia`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReferenceInfo {
    #[serde(rename = "NCFModificado")]
    pub ncf_modificado: String,
    #[serde(rename = "FechaNCFModificado")]
    pub fecha_ncf_modificado: String,
    pub codigo_modificacion: String,
    pub razon_modificacion: String,
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_issuer_extension_is_flattened() {
        let issuer = Issuer {
            rnc: Some("130000001".to_string()),
            fecha_emision: "01-06-2026".to_string(),
            extended: Some(IssuerExtension {
                zona_venta: "PRINCIPAL".to_string(),
                ..IssuerExtension::default()
            }),
            ..Issuer::default()
        };
        let json = serde_json::to_value(&issuer).unwrap();
        assert_eq!(json["RNC"], "130000001");
        assert_eq!(json["zonaVenta"], "PRINCIPAL");
        assert!(json.get("extended").is_none());
    }

    #[test]
    fn test_government_totals_omit_zero_tax_fields() {
        let totals = Totals::Government(GovernmentTotals {
            monto_total: Money::new(dec!(100)),
            valor_pagar: Money::new(dec!(100)),
            monto_gravado_total: None,
            itbis1: None,
            total_itbis: None,
            total_itbis1: None,
            monto_exento: Some(Money::new(dec!(100))),
        });
        let json = serde_json::to_value(&totals).unwrap();
        assert_eq!(json["MontoTotal"], "100.00");
        assert_eq!(json["MontoExento"], "100.00");
        assert!(json.get("TotalITBIS").is_none());
        assert_eq!(totals.grand_total(), Money::new(dec!(100)));
    }

    #[test]
    fn test_standard_totals_keep_null_tax_fields() {
        let totals = StandardTotals {
            monto_total: Money::new(dec!(50)),
            monto_exento: Some(Money::new(dec!(50))),
            ..StandardTotals::default()
        };
        let json = serde_json::to_value(&totals).unwrap();
        assert!(json["totalITBIS"].is_null());
        assert!(json.get("valorPagar").is_none());
        assert_eq!(json["montoTotal"], "50.00");
    }
}
