//! reqwest client for the open-data API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use legisync_core::config::UpstreamConfig;
use legisync_core::error::{AppError, ErrorKind};
use legisync_core::result::AppResult;
use legisync_entity::record::{Bill, Expense, Legislator, Vote};

use super::dto::{DeputadoDto, DespesaDto, Envelope, ProposicaoDto, VotacaoDto};
use crate::error::UpstreamError;
use crate::source::{BillQuery, ExpenseQuery, LegislativeSource, PageQuery, VoteQuery};

/// HTTP client for `dadosabertos.camara.leg.br/api/v2`.
#[derive(Debug, Clone)]
pub struct CamaraClient {
    http: Client,
    base_url: String,
}

impl CamaraClient {
    /// Build a client from configuration.
    pub fn new(config: &UpstreamConfig) -> AppResult<Self> {
        Url::parse(&config.base_url).map_err(|e| {
            AppError::with_source(
                ErrorKind::Configuration,
                format!("Invalid upstream base URL '{}'", config.base_url),
                e,
            )
        })?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build HTTP client", e)
            })?;

        info!(base_url = %config.base_url, "Upstream client ready");
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET one page of a listing endpoint and unwrap its `dados` array.
    async fn get_page<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, UpstreamError> {
        let url = Url::parse_with_params(&format!("{}{endpoint}", self.base_url), params)
            .map_err(|e| UpstreamError::InvalidRequest {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;
        debug!(%url, "Upstream request");

        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| transport_error(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(UpstreamError::from_status(endpoint, status.as_u16(), retry_after));
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout {
                    endpoint: endpoint.to_string(),
                }
            } else {
                UpstreamError::Decode {
                    endpoint: endpoint.to_string(),
                    message: e.to_string(),
                }
            }
        })?;
        Ok(envelope.dados)
    }
}

fn transport_error(endpoint: &str, e: reqwest::Error) -> UpstreamError {
    if e.is_timeout() {
        UpstreamError::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else {
        UpstreamError::Transport {
            endpoint: endpoint.to_string(),
            source: e,
        }
    }
}

fn paging(page: u32, per_page: u32) -> [(&'static str, String); 2] {
    [("pagina", page.to_string()), ("itens", per_page.to_string())]
}

#[async_trait]
impl LegislativeSource for CamaraClient {
    async fn fetch_legislators(&self, page: PageQuery) -> Result<Vec<Legislator>, UpstreamError> {
        let mut params = paging(page.page, page.per_page).to_vec();
        params.push(("ordenarPor", "id".to_string()));
        params.push(("ordem", "ASC".to_string()));

        let now = Utc::now();
        let rows: Vec<DeputadoDto> = self.get_page("/deputados", &params).await?;
        Ok(rows.into_iter().map(|dto| dto.into_record(now)).collect())
    }

    async fn fetch_bills(&self, query: BillQuery) -> Result<Vec<Bill>, UpstreamError> {
        let mut params = paging(query.page, query.per_page).to_vec();
        params.push(("ano", query.year.to_string()));
        if let Some(since) = query.since {
            params.push(("dataApresentacaoInicio", since.format("%Y-%m-%d").to_string()));
        }
        params.push(("ordenarPor", "id".to_string()));
        params.push(("ordem", "ASC".to_string()));

        let now = Utc::now();
        let rows: Vec<ProposicaoDto> = self.get_page("/proposicoes", &params).await?;
        Ok(rows.into_iter().map(|dto| dto.into_record(now)).collect())
    }

    async fn fetch_expenses(&self, query: ExpenseQuery) -> Result<Vec<Expense>, UpstreamError> {
        let mut params = paging(query.page, query.per_page).to_vec();
        params.push(("ano", query.year.to_string()));
        if let Some(month) = query.month {
            params.push(("mes", month.to_string()));
        }

        let endpoint = format!("/deputados/{}/despesas", query.legislator_id);
        let now = Utc::now();
        let rows: Vec<DespesaDto> = self.get_page(&endpoint, &params).await?;
        Ok(rows
            .into_iter()
            .map(|dto| dto.into_record(query.legislator_id, now))
            .collect())
    }

    async fn fetch_votes(&self, query: VoteQuery) -> Result<Vec<Vote>, UpstreamError> {
        let mut params = paging(query.page, query.per_page).to_vec();
        params.push(("dataInicio", query.start.format("%Y-%m-%d").to_string()));
        params.push(("dataFim", query.end.format("%Y-%m-%d").to_string()));
        params.push(("ordenarPor", "dataHoraRegistro".to_string()));
        params.push(("ordem", "ASC".to_string()));

        let now = Utc::now();
        let rows: Vec<VotacaoDto> = self.get_page("/votacoes", &params).await?;
        Ok(rows
            .into_iter()
            .filter_map(|dto| dto.into_record(now))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_base_url() {
        let config = UpstreamConfig {
            base_url: "not a url".into(),
            ..UpstreamConfig::default()
        };
        let err = CamaraClient::new(&config).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let config = UpstreamConfig {
            base_url: "https://dadosabertos.camara.leg.br/api/v2/".into(),
            ..UpstreamConfig::default()
        };
        let client = CamaraClient::new(&config).unwrap();
        assert_eq!(client.base_url, "https://dadosabertos.camara.leg.br/api/v2");
    }
}
