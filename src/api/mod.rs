// HTTP client for the labeling backend
//
// All retrieval is GET <base>/workspaces/<workspace>/<endpoint>?<query>;
// the one mutation is PUT element/{id}. The panel -> endpoint mapping is a
// closed match over FetchRequest, so a new panel kind cannot be wired up
// without the compiler seeing every dispatch site.

pub mod types;

use crate::panels::{pagination, Panel, PanelId};
use std::time::Duration;
use types::{
    CategoriesResponse, ElementsResponse, EvaluationResult, EvaluationSubmission,
    IterationsResponse, LabelUpdate,
};

/// Errors from talking to the backend
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// A fully resolved retrieval request for one panel fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchRequest {
    Document {
        doc_id: String,
        start: u64,
        size: u64,
    },
    Query {
        query: String,
        category: Option<u32>,
        start: u64,
        size: u64,
    },
    LabelNext {
        category: u32,
        start: u64,
        size: u64,
    },
    UserLabels {
        category: u32,
        value: Option<String>,
        start: u64,
        size: u64,
    },
    PositivePredictions {
        category: u32,
        value: Option<String>,
        start: u64,
        size: u64,
    },
    Suspicious {
        category: u32,
        start: u64,
        size: u64,
    },
    Contradictions {
        category: u32,
    },
    Evaluation {
        category: u32,
        size: u64,
    },
}

impl FetchRequest {
    /// Build the request for a panel's current state. Returns None when a
    /// prerequisite is missing: no document for the main view, no category
    /// or no query where one is required. Model-output panels are
    /// additionally gated by the caller on a ready model version.
    pub fn for_panel(
        panel: &Panel,
        current_document: Option<&str>,
        category: Option<u32>,
    ) -> Option<FetchRequest> {
        let start = pagination::start_index(panel.page, panel.page_size);
        let size = panel.page_size;
        match panel.id {
            PanelId::Document => Some(FetchRequest::Document {
                doc_id: current_document?.to_string(),
                start,
                size,
            }),
            PanelId::Search => Some(FetchRequest::Query {
                query: panel.query.clone()?,
                category,
                start,
                size,
            }),
            PanelId::LabelNext => Some(FetchRequest::LabelNext {
                category: category?,
                start,
                size,
            }),
            PanelId::UserLabels => Some(FetchRequest::UserLabels {
                category: category?,
                value: panel.filter.clone(),
                start,
                size,
            }),
            PanelId::PositivePredictions => Some(FetchRequest::PositivePredictions {
                category: category?,
                value: panel.filter.clone(),
                start,
                size,
            }),
            PanelId::Suspicious => Some(FetchRequest::Suspicious {
                category: category?,
                start,
                size,
            }),
            PanelId::ContradictingPairs => Some(FetchRequest::Contradictions {
                category: category?,
            }),
            PanelId::Evaluation => Some(FetchRequest::Evaluation {
                category: category?,
                size,
            }),
        }
    }

    fn endpoint(&self) -> String {
        match self {
            FetchRequest::Document { doc_id, .. } => format!("document/{doc_id}"),
            FetchRequest::Query { .. } => "query".to_string(),
            FetchRequest::LabelNext { .. } => "active_learning".to_string(),
            FetchRequest::UserLabels { .. } => "positive_elements".to_string(),
            FetchRequest::PositivePredictions { .. } => "positive_predictions".to_string(),
            FetchRequest::Suspicious { .. } => "suspicious_elements".to_string(),
            FetchRequest::Contradictions { .. } => "contradiction_elements".to_string(),
            FetchRequest::Evaluation { .. } => "precision_evaluation_elements".to_string(),
        }
    }

    fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        let mut window = |start: u64, size: u64| {
            params.push(("start_idx", start.to_string()));
            params.push(("size", size.to_string()));
        };
        match self {
            FetchRequest::Document { start, size, .. } => window(*start, *size),
            FetchRequest::Query {
                query,
                category,
                start,
                size,
            } => {
                window(*start, *size);
                params.push(("qry_string", query.clone()));
                if let Some(c) = category {
                    params.push(("category_id", c.to_string()));
                }
            }
            FetchRequest::LabelNext {
                category,
                start,
                size,
            }
            | FetchRequest::Suspicious {
                category,
                start,
                size,
            } => {
                window(*start, *size);
                params.push(("category_id", category.to_string()));
            }
            FetchRequest::UserLabels {
                category,
                value,
                start,
                size,
            }
            | FetchRequest::PositivePredictions {
                category,
                value,
                start,
                size,
            } => {
                window(*start, *size);
                params.push(("category_id", category.to_string()));
                if let Some(v) = value {
                    params.push(("value", v.clone()));
                }
            }
            FetchRequest::Contradictions { category } => {
                params.push(("category_id", category.to_string()));
            }
            FetchRequest::Evaluation { category, size } => {
                params.push(("category_id", category.to_string()));
                params.push(("size", size.to_string()));
            }
        }
        params
    }
}

/// Client for one workspace of the labeling backend
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    workspace: String,
}

impl ApiClient {
    pub fn new(base_url: &str, workspace: &str) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(ApiClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            workspace: workspace.to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/workspaces/{}/{}", self.base_url, self.workspace, endpoint)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::Status { status, body })
        }
    }

    /// Execute a panel retrieval
    pub async fn fetch(&self, request: &FetchRequest) -> Result<ElementsResponse, ApiError> {
        let url = self.url(&request.endpoint());
        tracing::debug!(%url, "panel fetch");
        let response = self
            .http
            .get(&url)
            .query(&request.query_params())
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Apply a label mutation. Empty success body.
    pub async fn put_label(
        &self,
        element_id: &str,
        category_id: u32,
        value: &'static str,
        update_counter: bool,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("element/{element_id}"));
        let body = LabelUpdate {
            category_id,
            value,
            update_counter,
        };
        let response = self.http.put(&url).json(&body).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Fetch the ordered training-iteration list for a category
    pub async fn fetch_iterations(
        &self,
        category_id: u32,
    ) -> Result<IterationsResponse, ApiError> {
        let url = self.url("iterations");
        let response = self
            .http
            .get(&url)
            .query(&[("category_id", category_id.to_string())])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// List the workspace's categories
    pub async fn fetch_categories(&self) -> Result<CategoriesResponse, ApiError> {
        let url = self.url("categories");
        let response = self.http.get(&url).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Submit a finished precision-evaluation round
    pub async fn submit_evaluation(
        &self,
        category_id: u32,
        submission: &EvaluationSubmission,
    ) -> Result<EvaluationResult, ApiError> {
        let url = self.url("precision_evaluation_elements");
        let response = self
            .http
            .post(&url)
            .query(&[("category_id", category_id.to_string())])
            .json(submission)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panels::{Panel, PanelId};

    #[test]
    fn test_for_panel_requires_category() {
        let panel = Panel::new(PanelId::LabelNext, 50);
        assert!(FetchRequest::for_panel(&panel, None, None).is_none());
        assert!(FetchRequest::for_panel(&panel, None, Some(1)).is_some());
    }

    #[test]
    fn test_for_panel_requires_document_for_main_view() {
        let panel = Panel::new(PanelId::Document, 100);
        assert!(FetchRequest::for_panel(&panel, None, Some(1)).is_none());
        let req = FetchRequest::for_panel(&panel, Some("doc7"), Some(1)).unwrap();
        assert_eq!(req.endpoint(), "document/doc7");
    }

    #[test]
    fn test_search_requires_query() {
        let mut panel = Panel::new(PanelId::Search, 50);
        assert!(FetchRequest::for_panel(&panel, None, Some(1)).is_none());
        panel.query = Some("rust".into());
        let req = FetchRequest::for_panel(&panel, None, Some(1)).unwrap();
        assert!(req
            .query_params()
            .contains(&("qry_string", "rust".to_string())));
    }

    #[test]
    fn test_pagination_window_params() {
        let mut panel = Panel::new(PanelId::UserLabels, 50);
        panel.page = 3;
        panel.filter = Some("true".into());
        let req = FetchRequest::for_panel(&panel, None, Some(2)).unwrap();
        let params = req.query_params();
        assert!(params.contains(&("start_idx", "100".to_string())));
        assert!(params.contains(&("size", "50".to_string())));
        assert!(params.contains(&("category_id", "2".to_string())));
        assert!(params.contains(&("value", "true".to_string())));
    }

    #[test]
    fn test_contradictions_has_no_pagination() {
        let panel = Panel::new(PanelId::ContradictingPairs, 50);
        let req = FetchRequest::for_panel(&panel, None, Some(1)).unwrap();
        let params = req.query_params();
        assert!(!params.iter().any(|(k, _)| *k == "start_idx"));
        assert_eq!(req.endpoint(), "contradiction_elements");
    }
}
