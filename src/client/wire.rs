//! Request and response bodies of the certification service.
//!
//! The service is inconsistent about types: result codes arrive as numbers or
//! numeric strings and flags may be null. Decoding is lenient about both.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

fn lenient_code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => number.as_i64(),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(flag)) => flag,
        Some(Value::String(text)) => text.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

/// Authentication request.
#[derive(Debug, Clone, Serialize)]
pub struct AuthRequest<'a> {
    #[serde(rename = "Usuario")]
    pub usuario: &'a str,
    #[serde(rename = "Clave")]
    pub clave: &'a str,
    #[serde(rename = "RNC")]
    pub rnc: &'a str,
}

/// Authentication response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthReply {
    /// 0 on success.
    #[serde(default, deserialize_with = "lenient_code")]
    pub codigo: Option<i64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub mensaje: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub token: Option<String>,
    /// Token expiration as sent by the service.
    #[serde(default, deserialize_with = "lenient_text")]
    pub fecha_expiracion: Option<String>,
}

impl AuthReply {
    /// The service accepted the credentials and returned a token.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.codigo == Some(0) && self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

/// Submission response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReply {
    #[serde(default, deserialize_with = "lenient_code")]
    pub codigo: Option<i64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub mensaje: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub procesado: bool,
    /// Security code printed on the invoice.
    #[serde(default, deserialize_with = "lenient_text")]
    pub codigo_seguridad: Option<String>,
    /// Signature timestamp.
    #[serde(default, deserialize_with = "lenient_text")]
    pub fecha_firma: Option<String>,
    /// Signed document, base64.
    #[serde(default, deserialize_with = "lenient_text")]
    pub xml_base64: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub fecha_emision: Option<String>,
    /// Whole response body.
    #[serde(skip)]
    pub raw: Value,
}

impl SubmitReply {
    /// Processed and code 0.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.procesado && self.codigo == Some(0)
    }
}

/// Status query request.
#[derive(Debug, Clone, Serialize)]
pub struct StatusRequest<'a> {
    pub token: &'a str,
    pub rnc: &'a str,
    pub documento: &'a str,
}

/// Status query response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusReply {
    #[serde(default, deserialize_with = "lenient_code")]
    pub codigo: Option<i64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub mensaje: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub procesado: bool,
    #[serde(default, deserialize_with = "lenient_text")]
    pub estado: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: Option<String>,
    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StatusReply {
    /// Status text: `estado`, then `status`, then `mensaje`.
    #[must_use]
    pub fn status_text(&self) -> Option<&str> {
        self.estado
            .as_deref()
            .or(self.status.as_deref())
            .or(self.mensaje.as_deref())
    }

    /// Reassemble the full response for reporting.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        let mut put = |key: &str, value: Value| {
            if !value.is_null() {
                map.insert(key.to_string(), value);
            }
        };
        put("codigo", self.codigo.map_or(Value::Null, Value::from));
        put("mensaje", self.mensaje.clone().map_or(Value::Null, Value::from));
        put("procesado", Value::Bool(self.procesado));
        put("estado", self.estado.clone().map_or(Value::Null, Value::from));
        put("status", self.status.clone().map_or(Value::Null, Value::from));
        put(
            "description",
            self.description.clone().map_or(Value::Null, Value::from),
        );
        Value::Object(map)
    }
}

/// Annulment request.
#[derive(Debug, Clone, Serialize)]
pub struct AnnulRequest {
    pub token: String,
    #[serde(rename = "Anulacion")]
    pub anulacion: AnnulBody,
}

/// `Anulacion`.
#[derive(Debug, Clone, Serialize)]
pub struct AnnulBody {
    #[serde(rename = "Encabezado")]
    pub encabezado: AnnulHeader,
    #[serde(rename = "DetallesAnulacion")]
    pub detalles: Vec<AnnulDetail>,
}

/// Annulment header.
#[derive(Debug, Clone, Serialize)]
pub struct AnnulHeader {
    #[serde(rename = "RNC")]
    pub rnc: String,
    /// Total count, at least two digits.
    #[serde(rename = "Cantidad")]
    pub cantidad: String,
    /// `DD-MM-YYYY HH:mm:ss`.
    #[serde(rename = "FechaHoraAnulacioneNCF")]
    pub fecha_hora: String,
}

/// One annulled span.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AnnulDetail {
    pub numero_linea: String,
    pub tipo_documento: String,
    pub tabla_secuencias_anuladas: Vec<AnnulledSequence>,
    pub cantidad: String,
}

/// Bounds of an annulled span.
#[derive(Debug, Clone, Serialize)]
pub struct AnnulledSequence {
    #[serde(rename = "NCFDesde")]
    pub desde: String,
    #[serde(rename = "NCFHasta")]
    pub hasta: String,
}

/// Annulment response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnulReply {
    #[serde(default, deserialize_with = "lenient_code")]
    pub codigo: Option<i64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub mensaje: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub procesado: bool,
    /// Signed annulment, base64.
    #[serde(default, deserialize_with = "lenient_text")]
    pub xml_base64: Option<String>,
}

impl AnnulReply {
    /// Processed, or code 0 or 100.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.procesado || matches!(self.codigo, Some(0 | 100))
    }
}

/// Download request.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadFileRequest<'a> {
    pub token: &'a str,
    pub rnc: &'a str,
    pub documento: &'a str,
    pub extension: &'a str,
}

/// Download response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadReply {
    #[serde(default, deserialize_with = "lenient_code")]
    pub codigo: Option<i64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub mensaje: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub procesado: bool,
    /// File contents, base64.
    #[serde(default, deserialize_with = "lenient_text")]
    pub archivo: Option<String>,
}

impl DownloadReply {
    /// Processed, with code 0 or 130.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.procesado && matches!(self.codigo, Some(0 | 130))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_accept_numbers_and_strings() {
        let reply: SubmitReply =
            serde_json::from_str(r#"{"codigo": "0", "procesado": true, "codigoSeguridad": "Ab12Cd"}"#)
                .unwrap();
        assert!(reply.is_success());
        assert_eq!(reply.codigo_seguridad.as_deref(), Some("Ab12Cd"));

        let reply: SubmitReply =
            serde_json::from_str(r#"{"codigo": 108, "procesado": null, "mensaje": "x"}"#).unwrap();
        assert_eq!(reply.codigo, Some(108));
        assert!(!reply.procesado);
    }

    #[test]
    fn test_auth_success_requires_token() {
        let ok: AuthReply =
            serde_json::from_str(r#"{"codigo": 0, "token": "abc", "fechaExpiracion": "2026-01-01T10:00:00"}"#)
                .unwrap();
        assert!(ok.is_success());

        let empty: AuthReply = serde_json::from_str(r#"{"codigo": 0, "token": ""}"#).unwrap();
        assert!(!empty.is_success());
    }

    #[test]
    fn test_status_text_priority_and_extra_fields() {
        let reply: StatusReply = serde_json::from_str(
            r#"{"codigo": 1, "procesado": true, "status": "Aceptado", "mensaje": "ok", "trackId": "t-1"}"#,
        )
        .unwrap();
        assert_eq!(reply.status_text(), Some("Aceptado"));
        let value = reply.to_value();
        assert_eq!(value["trackId"], "t-1");
        assert_eq!(value["codigo"], 1);
    }

    #[test]
    fn test_annul_request_shape() {
        let request = AnnulRequest {
            token: "t".to_string(),
            anulacion: AnnulBody {
                encabezado: AnnulHeader {
                    rnc: "130000001".to_string(),
                    cantidad: "01".to_string(),
                    fecha_hora: "01-06-2026 10:00:00".to_string(),
                },
                detalles: vec![AnnulDetail {
                    numero_linea: "1".to_string(),
                    tipo_documento: "31".to_string(),
                    tabla_secuencias_anuladas: vec![AnnulledSequence {
                        desde: "E310000000098".to_string(),
                        hasta: "E310000000098".to_string(),
                    }],
                    cantidad: "01".to_string(),
                }],
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["Anulacion"]["Encabezado"]["FechaHoraAnulacioneNCF"], "01-06-2026 10:00:00");
        assert_eq!(
            json["Anulacion"]["DetallesAnulacion"][0]["TablaSecuenciasAnuladas"][0]["NCFDesde"],
            "E310000000098"
        );
    }

    #[test]
    fn test_download_and_annul_success_rules() {
        let download: DownloadReply =
            serde_json::from_str(r#"{"codigo": 130, "procesado": true, "archivo": "PGE+"}"#).unwrap();
        assert!(download.is_success());

        let annul: AnnulReply = serde_json::from_str(r#"{"codigo": 100, "procesado": false}"#).unwrap();
        assert!(annul.is_success());
    }
}
