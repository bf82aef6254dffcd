//! Simplified invoice to canonical e-CF payload.
//!
//! The transformer validates the whole input in one pass, computes exempt and
//! taxable amounts, spreads discounts over the lines and lays the document out
//! according to the rule row of its type.

mod rules;

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, warn};

pub use rules::{DocumentRules, HeaderRules, TotalsLayout, rules_for};

use crate::domain::canonical::{
    AdditionalInfo, AdjustmentLine, Buyer, BuyerExtension, DocumentHeader,
    DocumentIdentification, ElectronicDocument, GovernmentTotals, ItemLine, Issuer,
    IssuerExtension, MinimalTotals, PaymentForm, ReferenceInfo, StandardTotals, Withholding,
};
use crate::domain::dates::{format_dmy, local_today, parse_date};
use crate::domain::invoice::{BuyerInput, DiscountEntry, DiscountInput};
use crate::domain::{
    AmountSummary, CanonicalInvoice, DocumentType, MAX_AMOUNT, Money, Scalar, SimplifiedInvoice,
    Totals,
};
use crate::error::{AppError, FieldIssue};
use crate::service::allocator::parse_document_type;
use crate::service::clock::Clock;

/// ITBIS rate.
pub const ITBIS_RATE: Decimal = dec!(0.18);

/// Largest accepted gap between the declared total and the line sum.
const TOTAL_TOLERANCE: Decimal = dec!(0.01);

/// Line as read from the input, before discounts.
#[derive(Debug, Clone)]
struct Line {
    name: Option<String>,
    description: Option<String>,
    quantity: Option<String>,
    unit: Option<String>,
    kind: Option<String>,
    taxable: bool,
    amount: Money,
}

#[derive(Debug, Default)]
struct Discounts {
    lines: Vec<AdjustmentLine>,
    total: Money,
}

fn text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn scalar_text(value: Option<&Scalar>) -> Option<String> {
    value.and_then(Scalar::as_text)
}

/// Non-negative amount up to [`MAX_AMOUNT`]; absent or blank counts as zero.
fn amount_field(value: Option<&Scalar>, field: String, issues: &mut Vec<FieldIssue>) -> Money {
    let Some(value) = value.filter(|value| value.as_text().is_some()) else {
        return Money::ZERO;
    };
    match value.as_amount() {
        Some(amount) if amount < Decimal::ZERO => {
            issues.push(FieldIssue::new(field, "must not be negative"));
            Money::ZERO
        }
        Some(amount) if amount > MAX_AMOUNT => {
            issues.push(FieldIssue::new(field, format!("must be at most {MAX_AMOUNT}")));
            Money::ZERO
        }
        Some(amount) => Money::new(amount),
        None => {
            issues.push(FieldIssue::new(field, "must be a number"));
            Money::ZERO
        }
    }
}

/// Scale `amounts` so they add up to exactly `net`.
///
/// Each line is multiplied by `net / gross` and rounded to cents; the rounding
/// residual lands on the last line.
pub(crate) fn redistribute(amounts: &mut [Money], net: Money) {
    let gross: Money = amounts.iter().copied().sum();
    if !gross.is_positive() {
        return;
    }
    let factor = net.amount() / gross.amount();
    for amount in amounts.iter_mut() {
        *amount = *amount * factor;
    }
    let adjusted: Money = amounts.iter().copied().sum();
    if let Some(last) = amounts.last_mut() {
        *last = *last + (net - adjusted);
    }
}

/// `DD-MM-YYYY` sequence expiration date.
///
/// Falls back to the end of the current year, or of next year during December.
fn due_date(raw: Option<&str>, today: NaiveDate) -> String {
    if let Some(raw) = text(raw) {
        if let Some(date) = parse_date(&raw) {
            return format_dmy(date);
        }
        warn!(value = %raw, "Unrecognized sequence expiration date, using fallback");
    }
    let year = if today.month() == 12 {
        today.year() + 1
    } else {
        today.year()
    };
    format!("31-12-{year}")
}

fn strip_leading_zeros(code: &str) -> String {
    let stripped = code.trim().trim_start_matches('0');
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

fn collect_lines(
    invoice: &SimplifiedInvoice,
    document_type: Option<DocumentType>,
    issues: &mut Vec<FieldIssue>,
) -> Vec<Line> {
    if document_type == Some(DocumentType::CreditNote) && !invoice.returned_items.is_empty() {
        return invoice
            .returned_items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let (value, field) = match item.monto_acreditar.as_ref() {
                    Some(credit) if credit.as_text().is_some() => (Some(credit), "montoAcreditar"),
                    _ => (item.precio.as_ref(), "precio"),
                };
                Line {
                    name: text(item.nombre.as_deref()),
                    description: None,
                    quantity: None,
                    unit: None,
                    kind: None,
                    taxable: false,
                    amount: amount_field(value, format!("ItemsDevueltos[{index}].{field}"), issues),
                }
            })
            .collect();
    }

    invoice
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| Line {
            name: text(item.nombre.as_deref()),
            description: text(item.descripcion.as_deref()),
            quantity: scalar_text(item.cantidad.as_ref()),
            unit: scalar_text(item.unidad_medida.as_ref()),
            kind: scalar_text(item.indicador_bieno_servicio.as_ref()),
            taxable: item.is_taxable(),
            amount: amount_field(item.precio.as_ref(), format!("items[{index}].precio"), issues),
        })
        .collect()
}

fn discount_line(
    number: usize,
    entry: &DiscountEntry,
    default_description: &str,
    value_kind: &str,
    value: Money,
    amount: Money,
) -> AdjustmentLine {
    AdjustmentLine {
        numero_linea: number.to_string(),
        tipo_ajuste: "D".to_string(),
        indicador_facturacion: scalar_text(entry.indicador_facturacion.as_ref())
            .unwrap_or_else(|| "4".to_string()),
        descripcion: entry
            .description()
            .unwrap_or_else(|| default_description.to_string()),
        tipo_valor: value_kind.to_string(),
        valor: value,
        monto: amount,
    }
}

fn collect_discounts(
    invoice: &SimplifiedInvoice,
    gross: Money,
    issues: &mut Vec<FieldIssue>,
) -> Discounts {
    let current = invoice
        .adjustments
        .as_ref()
        .and_then(|adjustments| adjustments.descuentos.as_ref());
    let (source, prefix) = match (current, invoice.descuentos.as_ref()) {
        (Some(source), _) => (source, "DescuentosORecargos.Descuentos"),
        (None, Some(source)) => (source, "descuentos"),
        (None, None) => return Discounts::default(),
    };

    let mut discounts = Discounts::default();
    match source {
        DiscountInput::List(entries) => {
            for (index, entry) in entries.iter().enumerate() {
                let amount =
                    amount_field(entry.raw_amount(), format!("{prefix}[{index}].Monto"), issues);
                if amount.is_zero() {
                    continue;
                }
                let Some(total) = discounts
                    .total
                    .checked_add(amount)
                    .filter(|total| total.within_limit())
                else {
                    issues.push(FieldIssue::new(
                        prefix,
                        format!("discounts add up to more than {MAX_AMOUNT}"),
                    ));
                    break;
                };
                let number = discounts.lines.len() + 1;
                discounts.lines.push(discount_line(
                    number,
                    entry,
                    "Descuento aplicado",
                    "$",
                    amount,
                    amount,
                ));
                discounts.total = total;
            }
        }
        DiscountInput::Global(entry) => {
            let percentage = entry
                .porcentaje
                .as_ref()
                .filter(|value| value.as_text().is_some());
            let (kind, value, amount) = if let Some(percentage) = percentage {
                let field = format!("{prefix}.porcentaje");
                let mut rate = amount_field(Some(percentage), field.clone(), issues);
                if rate.amount() > dec!(100) {
                    issues.push(FieldIssue::new(field, "must be at most 100"));
                    rate = Money::ZERO;
                }
                ("%", rate, gross * (rate.amount() / dec!(100)))
            } else {
                let amount = amount_field(entry.raw_amount(), format!("{prefix}.monto"), issues);
                ("$", amount, amount)
            };
            if amount.is_positive() {
                discounts
                    .lines
                    .push(discount_line(1, entry, "Descuento global", kind, value, amount));
                discounts.total = amount;
            }
        }
    }

    if discounts.total > gross {
        issues.push(FieldIssue::new(
            prefix,
            format!(
                "total discount {} exceeds invoice total {gross}",
                discounts.total
            ),
        ));
    }
    discounts
}

fn collect_reference(
    invoice: &SimplifiedInvoice,
    issues: &mut Vec<FieldIssue>,
) -> Option<ReferenceInfo> {
    let (ncf, date, code, reason, names) = match invoice.modificacion.as_ref() {
        Some(modification) => (
            text(modification.ncf_modificado.as_deref()),
            text(modification.fecha_ncf_modificado.as_deref()),
            scalar_text(modification.codigo_modificacion.as_ref()),
            text(modification.razon_modificacion.as_deref()),
            [
                "modificacion.NCFModificado",
                "modificacion.FechaNCFModificado",
                "modificacion.CodigoModificacion",
                "modificacion.RazonModificacion",
            ],
        ),
        None => {
            let header = &invoice.factura;
            (
                text(header.ncf_modificado.as_deref()),
                text(header.fecha_ncf_modificado.as_deref()),
                scalar_text(header.codigo_modificacion.as_ref()),
                text(header.razon_modificacion.as_deref()),
                [
                    "factura.ncfModificado",
                    "factura.fechaNCFModificado",
                    "factura.codigoModificacion",
                    "factura.razonModificacion",
                ],
            )
        }
    };

    let before = issues.len();
    let [ncf_field, date_field, code_field, reason_field] = names;
    if ncf.is_none() {
        issues.push(FieldIssue::new(
            ncf_field,
            "is required: number of the document being modified",
        ));
    }
    let date = match date {
        Some(raw) => {
            let parsed = parse_date(&raw);
            if parsed.is_none() {
                issues.push(FieldIssue::new(date_field, "must be DD-MM-YYYY or YYYY-MM-DD"));
            }
            parsed
        }
        None => {
            issues.push(FieldIssue::new(
                date_field,
                "is required: issue date of the document being modified",
            ));
            None
        }
    };
    if code.is_none() {
        issues.push(FieldIssue::new(code_field, "is required: modification code 1 to 4"));
    }
    if reason.is_none() {
        issues.push(FieldIssue::new(reason_field, "is required: reason for the modification"));
    }
    if issues.len() > before {
        return None;
    }

    Some(ReferenceInfo {
        ncf_modificado: ncf?,
        fecha_ncf_modificado: format_dmy(date?),
        codigo_modificacion: strip_leading_zeros(&code?),
        razon_modificacion: reason?,
    })
}

fn build_buyer(
    input: Option<&BuyerInput>,
    document_type: DocumentType,
    buyer_tax_id: Option<&String>,
    extended: bool,
) -> Buyer {
    let default = BuyerInput::default();
    let input = input.unwrap_or(&default);
    let tax_id = if document_type.requires_buyer_tax_id() {
        buyer_tax_id.cloned()
    } else {
        None
    };
    let email = text(input.correo.as_deref());

    Buyer {
        rnc: tax_id.clone(),
        razon_social: text(input.nombre.as_deref()),
        correo: email.clone(),
        direccion: text(input.direccion.as_deref()),
        municipio: text(input.municipio.as_deref()),
        provincia: text(input.provincia.as_deref()),
        extended: extended.then(|| BuyerExtension {
            contacto: text(input.nombre.as_deref()),
            envio_mail: if email.is_some() { "SI" } else { "NO" }.to_string(),
            fecha_entrega: text(input.fecha_entrega.as_deref()),
            fecha_orden: text(input.fecha_orden.as_deref()),
            numero_orden: scalar_text(input.numero_orden.as_ref()),
            codigo_interno: scalar_text(input.codigo_interno.as_ref()).or(tax_id),
        }),
    }
}

fn build_totals(
    layout: TotalsLayout,
    exempt: Money,
    taxable: Money,
    tax: Money,
    net: Money,
) -> Totals {
    let taxed = taxable.positive();
    let standard = StandardTotals {
        monto_gravado_total: taxed,
        monto_gravado_i1: taxed,
        itbis1: taxed.map(|_| "18".to_string()),
        total_itbis: taxed.map(|_| tax),
        total_itbis1: taxed.map(|_| tax),
        monto_total: net,
        monto_exento: exempt.positive(),
        ..StandardTotals::default()
    };

    match layout {
        TotalsLayout::Standard => Totals::Standard(standard),
        TotalsLayout::SpecialRegime => Totals::Standard(StandardTotals {
            valor_pagar: Some(net),
            ..standard
        }),
        TotalsLayout::Withholding => Totals::Standard(StandardTotals {
            valor_pagar: Some(net),
            total_itbis_retenido: Some(taxed.map_or(Money::ZERO, |_| tax)),
            total_isr_retencion: Some(Money::ZERO),
            ..standard
        }),
        TotalsLayout::Minimal => Totals::Minimal(MinimalTotals {
            monto_exento: net,
            monto_total: net,
        }),
        TotalsLayout::Government => {
            let total = taxable + tax + exempt;
            Totals::Government(GovernmentTotals {
                monto_total: total,
                valor_pagar: total,
                monto_gravado_total: taxed,
                itbis1: taxed.map(|_| "18".to_string()),
                total_itbis: taxed.map(|_| tax),
                total_itbis1: taxed.map(|_| tax),
                monto_exento: exempt.positive(),
            })
        }
    }
}

/// Builds canonical payloads from simplified invoices.
#[derive(Debug, Clone)]
pub struct DocumentTransformer {
    clock: Arc<dyn Clock>,
}

impl DocumentTransformer {
    /// Create a transformer; `clock` supplies today's date for defaults.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Validate `invoice` and lay it out for submission with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] listing every problem found.
    #[allow(clippy::too_many_lines)]
    pub fn transform(
        &self,
        invoice: &SimplifiedInvoice,
        token: &str,
    ) -> Result<CanonicalInvoice, AppError> {
        let mut issues = Vec::new();
        let today = local_today(self.clock.now());
        let header = &invoice.factura;

        let issuer_tax_id = scalar_text(invoice.emisor.rnc.as_ref());
        if issuer_tax_id.is_none() {
            issues.push(FieldIssue::new("emisor.rnc", "is required"));
        }
        let ncf = text(header.ncf.as_deref());
        if ncf.is_none() {
            issues.push(FieldIssue::new("factura.ncf", "is required"));
        }
        let document_type = match header.tipo.as_ref() {
            Some(raw) if raw.as_text().is_some() => {
                let parsed = parse_document_type(raw);
                if parsed.is_none() {
                    issues.push(FieldIssue::new(
                        "factura.tipo",
                        "must be one of 31, 32, 33, 34, 41, 43, 44, 45",
                    ));
                }
                parsed
            }
            _ => {
                issues.push(FieldIssue::new("factura.tipo", "is required"));
                None
            }
        };

        let buyer_tax_id = invoice
            .comprador
            .as_ref()
            .and_then(|buyer| scalar_text(buyer.rnc.as_ref()));
        if buyer_tax_id.is_none() && document_type.is_some_and(DocumentType::requires_buyer_tax_id)
        {
            issues.push(FieldIssue::new("comprador.rnc", "is required for this document type"));
        }

        let lines = collect_lines(invoice, document_type, &mut issues);
        if lines.is_empty() {
            issues.push(FieldIssue::new("items", "must contain at least one line"));
        }

        let issue_date = match text(header.fecha.as_deref()) {
            Some(raw) => parse_date(&raw).unwrap_or_else(|| {
                issues.push(FieldIssue::new("factura.fecha", "must be DD-MM-YYYY or YYYY-MM-DD"));
                today
            }),
            None => today,
        };

        let rules = document_type.map(rules_for);
        let reference = match rules {
            Some(rules) if rules.reference => collect_reference(invoice, &mut issues),
            _ => None,
        };

        let gross = Money::checked_sum(lines.iter().map(|line| line.amount))
            .filter(|gross| gross.within_limit())
            .unwrap_or_else(|| {
                issues.push(FieldIssue::new(
                    "items",
                    format!("line amounts add up to more than {MAX_AMOUNT}"),
                ));
                Money::ZERO
            });
        let discounts = collect_discounts(invoice, gross, &mut issues);

        let (Some(document_type), Some(rules), Some(issuer_tax_id), Some(ncf)) =
            (document_type, rules, issuer_tax_id, ncf)
        else {
            return Err(AppError::Validation(issues));
        };
        if !issues.is_empty() {
            return Err(AppError::Validation(issues));
        }

        let declared = header
            .total
            .as_ref()
            .and_then(Scalar::as_amount)
            .map(Money::new)
            .filter(|declared| declared.abs_diff(gross) > TOTAL_TOLERANCE);
        if let Some(declared) = declared {
            warn!(
                ncf = %ncf,
                declared = %declared,
                computed = %gross,
                "Declared total differs from line sum, using line sum"
            );
        }

        let net = gross - discounts.total;
        let mut amounts: Vec<Money> = lines.iter().map(|line| line.amount).collect();
        if discounts.total.is_positive() {
            redistribute(&mut amounts, net);
            debug!(ncf = %ncf, discount = %discounts.total, net = %net, "Discount spread over lines");
        }

        let taxable: Money = lines
            .iter()
            .zip(&amounts)
            .filter(|(line, _)| line.taxable)
            .map(|(_, amount)| *amount)
            .sum();
        let exempt = net - taxable;
        let tax = taxable * ITBIS_RATE;

        let items = lines
            .iter()
            .zip(&amounts)
            .enumerate()
            .map(|(index, (line, amount))| ItemLine {
                numero_linea: (index + 1).to_string(),
                indicador_facturacion: if line.taxable { "1" } else { "4" }.to_string(),
                retencion: rules.withholding.then(|| Withholding {
                    indicador_agente: "1".to_string(),
                    monto_itbis: if line.taxable {
                        line.amount * ITBIS_RATE
                    } else {
                        Money::ZERO
                    },
                    monto_isr: Money::ZERO,
                }),
                nombre: line.name.clone(),
                indicador_bieno_servicio: line.kind.clone().unwrap_or_else(|| "1".to_string()),
                descripcion: line.description.clone(),
                cantidad: line.quantity.clone().unwrap_or_else(|| "1.00".to_string()),
                unidad_medida: line.unit.clone().unwrap_or_else(|| "43".to_string()),
                precio_unitario: *amount,
                monto: *amount,
            })
            .collect();

        let switches = rules.header;
        let identification = DocumentIdentification {
            tipo_documento: document_type.as_code_str(),
            ncf: ncf.clone(),
            fecha_vencimiento_secuencia: rules
                .due_date
                .then(|| due_date(header.fecha_venc_ncf.as_deref(), today)),
            indicador_monto_gravado: switches
                .gross_indicator
                .then(|| if taxable.is_positive() { "1" } else { "0" }.to_string()),
            indicador_envio_diferido: switches.deferred_send.then(|| "1".to_string()),
            indicador_nota_credito: switches.credit_note_indicator.then(|| "0".to_string()),
            tipo_ingresos: switches.income_type.map(str::to_string),
            tipo_pago: switches.payment_type.then(|| "1".to_string()),
            tabla_formas_pago: switches.payment_forms.then(|| {
                vec![PaymentForm {
                    forma: "1".to_string(),
                    monto: net,
                }]
            }),
        };

        let issuer_input = &invoice.emisor;
        let invoice_id = scalar_text(header.id.as_ref());
        let issuer = Issuer {
            rnc: Some(issuer_tax_id),
            razon_social: text(issuer_input.razon_social.as_deref()),
            direccion: text(issuer_input.direccion.as_deref()),
            municipio: text(issuer_input.municipio.as_deref()),
            provincia: text(issuer_input.provincia.as_deref()),
            tabla_telefono: issuer_input.telefono.clone(),
            fecha_emision: format_dmy(issue_date),
            extended: rules.extended_parties.then(|| IssuerExtension {
                nombre_comercial: text(issuer_input.razon_social.as_deref()),
                correo: text(issuer_input.correo.as_deref()),
                web_site: text(issuer_input.web_site.as_deref()),
                codigo_vendedor: invoice_id.clone(),
                numero_factura_interna: invoice_id.clone(),
                numero_pedido_interno: invoice_id.clone(),
                zona_venta: "PRINCIPAL".to_string(),
            }),
        };

        let buyer = rules.buyer.then(|| {
            build_buyer(
                invoice.comprador.as_ref(),
                document_type,
                buyer_tax_id.as_ref(),
                rules.extended_parties,
            )
        });
        let additional_info = rules.additional_info.then(|| AdditionalInfo {
            numero_contenedor: text(header.numero_contenedor.as_deref()),
            numero_referencia: invoice_id.clone(),
        });

        let totals = build_totals(rules.totals, exempt, taxable, tax, net);
        let summary = AmountSummary {
            exempt,
            taxable,
            tax,
            net_total: net,
            discount_total: discounts.total,
            reported_total: totals.grand_total(),
        };

        let adjustments = if !discounts.lines.is_empty() {
            Some(discounts.lines)
        } else if rules.empty_adjustments {
            Some(Vec::new())
        } else {
            None
        };

        debug!(ncf = %ncf, document_type = %document_type, total = %summary.reported_total, "Invoice transformed");

        Ok(CanonicalInvoice {
            token: token.to_string(),
            document: ElectronicDocument {
                header: DocumentHeader {
                    identification,
                    issuer,
                    buyer,
                    additional_info,
                    totals,
                },
                items,
                adjustments,
                reference,
            },
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use proptest::prelude::*;
    use serde_json::{Value, json};

    use super::*;
    use crate::service::clock::ManualClock;

    fn transformer_at(now: DateTime<Utc>) -> DocumentTransformer {
        DocumentTransformer::new(Arc::new(ManualClock::new(now)))
    }

    fn transformer() -> DocumentTransformer {
        transformer_at(Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap())
    }

    fn invoice(value: Value) -> SimplifiedInvoice {
        serde_json::from_value(value).unwrap()
    }

    fn base(tipo: &str, ncf: &str) -> Value {
        json!({
            "emisor": {"rnc": "130000001", "razonSocial": "Clinica Central", "correo": "info@clinica.do"},
            "comprador": {"rnc": "101000002", "nombre": "Seguros Norte", "correo": "pagos@norte.do"},
            "factura": {"ncf": ncf, "tipo": tipo, "fecha": "2026-06-10", "id": 8841, "total": "1,500.00"},
            "items": [
                {"nombre": "Consulta", "precio": "1,000.00", "itbis": true},
                {"nombre": "Laboratorio", "precio": 500}
            ]
        })
    }

    fn render(invoice_json: Value) -> Value {
        let canonical = transformer().transform(&invoice(invoice_json), "tok").unwrap();
        serde_json::to_value(&canonical).unwrap()
    }

    fn issues_of(err: AppError) -> Vec<String> {
        match err {
            AppError::Validation(issues) => issues.into_iter().map(|i| i.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_tax_credit_invoice_layout() {
        let mut input = base("31", "E310000000001");
        input["factura"]["fechaVencNCF"] = json!("2027-03-31");
        let json = render(input);
        let doc = &json["DocumentoElectronico"];
        let id = &doc["Encabezado"]["IdentificacionDocumento"];

        assert_eq!(json["Token"], "tok");
        assert_eq!(id["TipoDocumento"], "31");
        assert_eq!(id["FechaVencimientoSecuencia"], "31-03-2027");
        assert_eq!(id["IndicadorMontoGravado"], "1");
        assert_eq!(id["IndicadorEnvioDiferido"], "1");
        assert_eq!(id["TipoIngresos"], "01");
        assert_eq!(id["TablaFormasPago"][0]["Monto"], "1500.00");

        let issuer = &doc["Encabezado"]["Emisor"];
        assert_eq!(issuer["FechaEmision"], "10-06-2026");
        assert_eq!(issuer["zonaVenta"], "PRINCIPAL");
        assert_eq!(issuer["numeroFacturaInterna"], "8841");

        let buyer = &doc["Encabezado"]["comprador"];
        assert_eq!(buyer["rnc"], "101000002");
        assert_eq!(buyer["envioMail"], "SI");
        assert_eq!(buyer["codigoInterno"], "101000002");

        let totals = &doc["Encabezado"]["Totales"];
        assert_eq!(totals["montoGravadoTotal"], "1000.00");
        assert_eq!(totals["totalITBIS"], "180.00");
        assert_eq!(totals["montoExento"], "500.00");
        assert_eq!(totals["montoTotal"], "1500.00");

        assert_eq!(doc["DetallesItems"][0]["IndicadorFacturacion"], "1");
        assert_eq!(doc["DetallesItems"][1]["IndicadorFacturacion"], "4");
        assert_eq!(doc["DetallesItems"][1]["UnidadMedida"], "43");
        assert!(doc.get("DescuentosORecargos").is_none());
        assert!(doc.get("InformacionReferencia").is_none());
    }

    #[test]
    fn test_all_issues_reported_together() {
        let err = transformer()
            .transform(&invoice(json!({"comprador": {}})), "tok")
            .unwrap_err();
        let fields = issues_of(err);
        assert_eq!(
            fields,
            vec!["emisor.rnc", "factura.ncf", "factura.tipo", "items"]
        );
    }

    #[test]
    fn test_buyer_tax_id_required_except_consumer() {
        let mut input = base("31", "E310000000001");
        input["comprador"]["rnc"] = Value::Null;
        let err = transformer().transform(&invoice(input), "tok").unwrap_err();
        assert_eq!(issues_of(err), vec!["comprador.rnc"]);

        let json = render(base("32", "E320000000001"));
        let header = &json["DocumentoElectronico"]["Encabezado"];
        assert!(header["comprador"]["rnc"].is_null());
        assert!(header["comprador"]["codigoInterno"].is_null());
        assert!(header["IdentificacionDocumento"]
            .get("FechaVencimientoSecuencia")
            .is_none());
    }

    #[test]
    fn test_credit_note_with_returned_items() {
        let json = render(json!({
            "emisor": {"rnc": "130000001"},
            "comprador": {"rnc": "101000002"},
            "factura": {"ncf": "E340000000003", "tipo": "34"},
            "ItemsDevueltos": [
                {"nombre": "Consulta", "montoAcreditar": "300"},
                {"nombre": "Rayos X", "precio": 200}
            ],
            "modificacion": {
                "NCFModificado": "E310000000005",
                "FechaNCFModificado": "2026-02-01",
                "CodigoModificacion": "03",
                "RazonModificacion": " Devolucion "
            }
        }));
        let doc = &json["DocumentoElectronico"];
        let id = &doc["Encabezado"]["IdentificacionDocumento"];
        assert!(id.get("FechaVencimientoSecuencia").is_none());
        assert_eq!(id["IndicadorNotaCredito"], "0");
        assert!(id.get("TablaFormasPago").is_none());

        assert_eq!(doc["DetallesItems"][0]["Monto"], "300.00");
        assert_eq!(doc["DetallesItems"][1]["Monto"], "200.00");
        assert_eq!(doc["Encabezado"]["Totales"]["montoTotal"], "500.00");

        let reference = &doc["InformacionReferencia"];
        assert_eq!(reference["NCFModificado"], "E310000000005");
        assert_eq!(reference["FechaNCFModificado"], "01-02-2026");
        assert_eq!(reference["CodigoModificacion"], "3");
        assert_eq!(reference["RazonModificacion"], "Devolucion");
    }

    #[test]
    fn test_debit_note_requires_reference_fields() {
        let mut input = base("33", "E330000000001");
        input["factura"]["ncfModificado"] = json!("E310000000002");
        let err = transformer().transform(&invoice(input), "tok").unwrap_err();
        assert_eq!(
            issues_of(err),
            vec![
                "factura.fechaNCFModificado",
                "factura.codigoModificacion",
                "factura.razonModificacion"
            ]
        );
    }

    #[test]
    fn test_debit_note_inline_reference() {
        let mut input = base("33", "E330000000001");
        input["factura"]["ncfModificado"] = json!("E310000000002");
        input["factura"]["fechaNCFModificado"] = json!("05-01-2026");
        input["factura"]["codigoModificacion"] = json!(2);
        input["factura"]["razonModificacion"] = json!("Correccion de monto");
        let json = render(input);
        let doc = &json["DocumentoElectronico"];
        assert_eq!(doc["Encabezado"]["IdentificacionDocumento"]["TipoIngresos"], "03");
        assert_eq!(
            doc["Encabezado"]["IdentificacionDocumento"]["FechaVencimientoSecuencia"],
            "31-12-2026"
        );
        assert_eq!(doc["InformacionReferencia"]["CodigoModificacion"], "2");
    }

    #[test]
    fn test_discount_list_redistributed_over_lines() {
        let mut input = base("31", "E310000000001");
        input["items"] = json!([
            {"precio": 100, "itbis": true},
            {"precio": 200},
            {"precio": "300.33"}
        ]);
        input["DescuentosORecargos"] = json!({"Descuentos": [
            {"Monto": "50", "Descripcion": "Promo"},
            {"Monto": 0},
            {"monto": "0.33"}
        ]});
        let canonical = transformer().transform(&invoice(input), "tok").unwrap();

        let amounts: Money = canonical.document.items.iter().map(|item| item.monto).sum();
        assert_eq!(amounts.to_string(), "550.00");
        assert_eq!(canonical.summary.discount_total.to_string(), "50.33");
        assert_eq!(canonical.summary.net_total.to_string(), "550.00");
        assert_eq!(
            canonical.summary.exempt + canonical.summary.taxable,
            canonical.summary.net_total
        );

        let adjustments = canonical.document.adjustments.unwrap();
        assert_eq!(adjustments.len(), 2);
        assert_eq!(adjustments[0].descripcion, "Promo");
        assert_eq!(adjustments[1].numero_linea, "2");
        assert_eq!(adjustments[1].descripcion, "Descuento aplicado");
        assert_eq!(adjustments[1].indicador_facturacion, "4");
    }

    #[test]
    fn test_percentage_global_discount() {
        let mut input = base("31", "E310000000001");
        input["descuentos"] = json!({"porcentaje": 10});
        let canonical = transformer().transform(&invoice(input), "tok").unwrap();

        let adjustments = canonical.document.adjustments.unwrap();
        assert_eq!(adjustments[0].tipo_valor, "%");
        assert_eq!(adjustments[0].valor.to_string(), "10.00");
        assert_eq!(adjustments[0].monto.to_string(), "150.00");
        assert_eq!(adjustments[0].descripcion, "Descuento global");
        assert_eq!(canonical.summary.net_total.to_string(), "1350.00");
        assert_eq!(canonical.summary.taxable.to_string(), "900.00");
        assert_eq!(canonical.summary.tax.to_string(), "162.00");
    }

    #[test]
    fn test_discount_errors() {
        let mut input = base("31", "E310000000001");
        input["descuentos"] = json!([{"monto": "-5"}]);
        let err = transformer().transform(&invoice(input.clone()), "tok").unwrap_err();
        assert_eq!(issues_of(err), vec!["descuentos[0].Monto"]);

        input["descuentos"] = json!({"monto": "1,600"});
        let err = transformer().transform(&invoice(input), "tok").unwrap_err();
        assert_eq!(issues_of(err), vec!["descuentos"]);
    }

    #[test]
    fn test_government_totals_include_tax() {
        let json = render(base("45", "E450000000001"));
        let doc = &json["DocumentoElectronico"];
        let totals = &doc["Encabezado"]["Totales"];
        assert_eq!(totals["MontoGravadoTotal"], "1000.00");
        assert_eq!(totals["TotalITBIS"], "180.00");
        assert_eq!(totals["MontoExento"], "500.00");
        assert_eq!(totals["MontoTotal"], "1680.00");
        assert_eq!(totals["ValorPagar"], "1680.00");
        assert_eq!(doc["DescuentosORecargos"], json!([]));
        assert!(doc["Encabezado"]["IdentificacionDocumento"]
            .get("TablaFormasPago")
            .is_none());
    }

    #[test]
    fn test_minor_expenses_has_no_buyer() {
        let json = render(base("43", "E430000000001"));
        let header = &json["DocumentoElectronico"]["Encabezado"];
        assert!(header.get("comprador").is_none());
        assert!(header.get("informacionesAdicionales").is_none());
        assert!(header["IdentificacionDocumento"].get("TipoPago").is_none());
        assert_eq!(header["Totales"], json!({"montoExento": "1500.00", "montoTotal": "1500.00"}));
        assert!(header["Emisor"].get("zonaVenta").is_none());
    }

    #[test]
    fn test_purchase_lines_carry_withholding() {
        let json = render(base("41", "E410000000001"));
        let doc = &json["DocumentoElectronico"];
        assert_eq!(doc["DetallesItems"][0]["retencion"]["montoITBIS"], "180.00");
        assert_eq!(doc["DetallesItems"][1]["retencion"]["montoITBIS"], "0.00");
        let totals = &doc["Encabezado"]["Totales"];
        assert_eq!(totals["valorPagar"], "1500.00");
        assert_eq!(totals["totalITBISRetenido"], "180.00");
        assert_eq!(totals["totalISRRetencion"], "0.00");
    }

    #[test]
    fn test_special_regime_amount_payable() {
        let json = render(base("44", "E440000000001"));
        let header = &json["DocumentoElectronico"]["Encabezado"];
        assert_eq!(header["Totales"]["valorPagar"], "1500.00");
        assert!(header["Totales"].get("totalITBISRetenido").is_none());
        assert!(header["IdentificacionDocumento"]
            .get("IndicadorMontoGravado")
            .is_none());
    }

    #[test]
    fn test_declared_total_mismatch_uses_line_sum() {
        let mut input = base("31", "E310000000001");
        input["factura"]["total"] = json!("9999.99");
        let canonical = transformer().transform(&invoice(input), "tok").unwrap();
        assert_eq!(canonical.summary.reported_total.to_string(), "1500.00");
    }

    #[test]
    fn test_due_date_fallback_rolls_over_in_december() {
        let december = transformer_at(Utc.with_ymd_and_hms(2026, 12, 10, 12, 0, 0).unwrap());
        let canonical = december
            .transform(&invoice(base("31", "E310000000001")), "tok")
            .unwrap();
        assert_eq!(
            canonical
                .document
                .header
                .identification
                .fecha_vencimiento_secuencia
                .as_deref(),
            Some("31-12-2027")
        );
        assert_eq!(due_date(Some("garbage"), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()), "31-12-2026");
    }

    #[test]
    fn test_invalid_amount_and_date() {
        let mut input = base("31", "E310000000001");
        input["items"][1]["precio"] = json!("doce");
        input["factura"]["fecha"] = json!("ayer");
        let err = transformer().transform(&invoice(input), "tok").unwrap_err();
        assert_eq!(issues_of(err), vec!["items[1].precio", "factura.fecha"]);
    }

    #[test]
    fn test_oversized_amounts_are_validation_errors() {
        let mut input = base("31", "E310000000001");
        input["items"] = json!([
            {"precio": "50000000000000000000000000000"},
            {"precio": "50000000000000000000000000000"}
        ]);
        let err = transformer().transform(&invoice(input.clone()), "tok").unwrap_err();
        assert_eq!(issues_of(err), vec!["items[0].precio", "items[1].precio"]);

        input["items"] = json!([
            {"precio": "999,999,999,999,999.99"},
            {"precio": "999999999999999.99"}
        ]);
        let err = transformer().transform(&invoice(input.clone()), "tok").unwrap_err();
        assert_eq!(issues_of(err), vec!["items"]);

        input["items"] = json!([{"precio": 100}]);
        input["descuentos"] = json!({"porcentaje": "1e27"});
        let err = transformer().transform(&invoice(input), "tok").unwrap_err();
        assert_eq!(issues_of(err), vec!["descuentos.porcentaje"]);
    }

    #[test]
    fn test_withholding_uses_undiscounted_line_amount() {
        let mut input = base("41", "E410000000001");
        input["descuentos"] = json!({"monto": "150"});
        let json = render(input);
        let doc = &json["DocumentoElectronico"];
        assert_eq!(doc["DetallesItems"][0]["Monto"], "900.00");
        assert_eq!(doc["DetallesItems"][0]["retencion"]["montoITBIS"], "180.00");
        assert_eq!(doc["DetallesItems"][1]["retencion"]["montoITBIS"], "0.00");
    }

    proptest! {
        #[test]
        fn prop_redistribution_sums_to_net(
            cents in proptest::collection::vec(0u32..10_000_000, 1..12),
            discount_share in 0u32..=1000,
        ) {
            let mut amounts: Vec<Money> = cents
                .iter()
                .map(|c| Money::new(Decimal::new(i64::from(*c), 2)))
                .collect();
            let gross: Money = amounts.iter().copied().sum();
            let discount = gross * (Decimal::from(discount_share) / dec!(1000));
            let net = gross - discount;

            redistribute(&mut amounts, net);
            let total: Money = amounts.iter().copied().sum();
            prop_assert_eq!(total, net);
        }

        #[test]
        fn prop_due_date_present_iff_type_expires(index in 0usize..8) {
            let document_type = DocumentType::ALL[index];
            let ncf = format!("E{}0000000001", document_type.as_code_str());
            let mut input = base(&document_type.as_code_str(), &ncf);
            input["modificacion"] = json!({
                "NCFModificado": "E310000000001",
                "FechaNCFModificado": "01-01-2026",
                "CodigoModificacion": "1",
                "RazonModificacion": "Ajuste"
            });
            let canonical = transformer().transform(&invoice(input), "tok").unwrap();
            prop_assert_eq!(
                canonical.document.header.identification.fecha_vencimiento_secuencia.is_some(),
                document_type.requires_expiration()
            );
        }
    }
}
