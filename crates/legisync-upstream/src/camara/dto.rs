//! Wire shapes of the open-data API and their conversion into records.
//!
//! Every listing wraps its items in `{"dados": [...], "links": [...]}`.
//! Timestamps carry no offset; they are stored as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

use legisync_entity::record::{Bill, Expense, Legislator, Vote};

/// Listing envelope.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub dados: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeputadoDto {
    pub id: i64,
    pub nome: String,
    pub sigla_partido: Option<String>,
    pub sigla_uf: Option<String>,
    pub id_legislatura: Option<i32>,
    pub url_foto: Option<String>,
    pub email: Option<String>,
}

impl DeputadoDto {
    pub fn into_record(self, synced_at: DateTime<Utc>) -> Legislator {
        Legislator {
            id: self.id,
            name: self.nome,
            party: self.sigla_partido,
            state: self.sigla_uf,
            legislature_id: self.id_legislatura,
            email: self.email,
            photo_url: self.url_foto,
            synced_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposicaoDto {
    pub id: i64,
    pub sigla_tipo: String,
    pub numero: i32,
    pub ano: i32,
    pub ementa: Option<String>,
    pub data_apresentacao: Option<String>,
}

impl ProposicaoDto {
    pub fn into_record(self, synced_at: DateTime<Utc>) -> Bill {
        Bill {
            id: self.id,
            bill_type: self.sigla_tipo,
            number: self.numero,
            year: self.ano,
            summary: self.ementa.filter(|s| !s.trim().is_empty()),
            presented_at: self.data_apresentacao.as_deref().and_then(parse_timestamp),
            synced_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DespesaDto {
    pub ano: i32,
    pub mes: i32,
    pub tipo_despesa: String,
    pub cod_documento: i64,
    pub data_documento: Option<String>,
    pub num_documento: Option<String>,
    pub nome_fornecedor: Option<String>,
    pub cnpj_cpf_fornecedor: Option<String>,
    pub valor_liquido: f64,
}

impl DespesaDto {
    pub fn into_record(self, legislator_id: i64, synced_at: DateTime<Utc>) -> Expense {
        let document_number = self.num_documento.filter(|s| !s.trim().is_empty());
        Expense {
            id: Expense::compose_id(
                legislator_id,
                self.ano,
                self.mes,
                self.cod_documento,
                document_number.as_deref(),
            ),
            legislator_id,
            year: self.ano,
            month: self.mes,
            expense_type: self.tipo_despesa,
            supplier_name: self.nome_fornecedor,
            supplier_document: self.cnpj_cpf_fornecedor.filter(|s| !s.is_empty()),
            document_number,
            document_date: self.data_documento.as_deref().and_then(parse_date),
            amount_cents: (self.valor_liquido * 100.0).round() as i64,
            synced_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotacaoDto {
    pub id: String,
    pub data: String,
    pub data_hora_registro: Option<String>,
    pub sigla_orgao: Option<String>,
    pub descricao: Option<String>,
    pub aprovacao: Option<i32>,
    pub uri_proposicao_objeto: Option<String>,
}

impl VotacaoDto {
    /// Returns `None` when the vote date is unparseable.
    pub fn into_record(self, synced_at: DateTime<Utc>) -> Option<Vote> {
        let date = parse_date(&self.data)?;
        Some(Vote {
            id: self.id,
            date,
            registered_at: self.data_hora_registro.as_deref().and_then(parse_timestamp),
            body: self.sigla_orgao,
            description: self.descricao,
            approved: self.aprovacao.map(|a| a != 0),
            bill_uri: self.uri_proposicao_objeto,
            synced_at,
        })
    }
}

/// Accepts `YYYY-MM-DD` with or without a trailing time component.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .or_else(|| parse_date(raw).and_then(|d| d.and_hms_opt(0, 0, 0)).map(|n| n.and_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expense_conversion() {
        let body = r#"{"dados": [{
            "ano": 2023, "mes": 4, "tipoDespesa": "COMBUSTÍVEIS E LUBRIFICANTES.",
            "codDocumento": 7523412, "tipoDocumento": "Nota Fiscal",
            "dataDocumento": "2023-04-12T00:00:00", "numDocumento": "000123",
            "valorDocumento": 250.9, "nomeFornecedor": "POSTO CENTRAL",
            "cnpjCpfFornecedor": "12345678000190", "valorLiquido": 250.9
        }], "links": []}"#;
        let envelope: Envelope<DespesaDto> = serde_json::from_str(body).unwrap();
        let expense = envelope
            .dados
            .into_iter()
            .next()
            .unwrap()
            .into_record(204554, Utc::now());

        assert_eq!(expense.id, "204554-2023-04-7523412-000123");
        assert_eq!(expense.amount_cents, 25090);
        assert_eq!(expense.document_date, NaiveDate::from_ymd_opt(2023, 4, 12));
    }

    #[test]
    fn test_vote_conversion() {
        let body = r#"{"id": "2367548-52", "uri": "https://x", "data": "2023-05-10",
            "dataHoraRegistro": "2023-05-10T18:22:11", "siglaOrgao": "PLEN",
            "descricao": "Aprovada a Redação Final.", "aprovacao": 1,
            "uriProposicaoObjeto": null}"#;
        let dto: VotacaoDto = serde_json::from_str(body).unwrap();
        let vote = dto.into_record(Utc::now()).unwrap();
        assert_eq!(vote.date, NaiveDate::from_ymd_opt(2023, 5, 10).unwrap());
        assert_eq!(vote.approved, Some(true));
        assert!(vote.registered_at.is_some());
    }

    #[test]
    fn test_bill_blank_summary_is_dropped() {
        let body = r#"{"id": 2345, "uri": "u", "siglaTipo": "PL", "codTipo": 139,
            "numero": 12, "ano": 2023, "ementa": "  "}"#;
        let dto: ProposicaoDto = serde_json::from_str(body).unwrap();
        let bill = dto.into_record(Utc::now());
        assert_eq!(bill.summary, None);
        assert_eq!(bill.presented_at, None);
    }
}
