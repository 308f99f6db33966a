//! HTTP client for the firewall management centre REST API
//! 基于 reqwest 的远端策略存储实现；认证令牌由调用方提供

use async_trait::async_trait;
use reqwest::header::HeaderValue;
use reqwest::{Client, RequestBuilder, Response};
use rulesync_engine::{Category, Destination, Rule};
use url::Url;

use super::wire::{BulkBody, CategoryBody, ListBody, RuleBody};
use super::{ListQuery, Page, PolicyApi, RemoteRule};
use crate::config::RemoteOptions;
use crate::error::{SyncError, SyncResult};

/// 认证令牌请求头
const AUTH_HEADER: &str = "X-auth-access-token";

/// 远端策略存储的 HTTP 客户端
#[derive(Debug, Clone)]
pub struct FmcClient {
    client: Client,
    /// `{base_url}/api/fmc_config/v1/domain/{domain}/`
    domain_url: Url,
    token: HeaderValue,
}

impl FmcClient {
    pub fn new(options: &RemoteOptions) -> SyncResult<Self> {
        let client = Client::builder().timeout(options.timeout).build()?;

        let mut base = options.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let domain_url = Url::parse(&base)?.join(&format!("api/fmc_config/v1/domain/{}/", options.domain))?;

        let mut token = HeaderValue::from_str(&options.access_token)?;
        token.set_sensitive(true);

        log::debug!("remote policy API at {}", domain_url);
        Ok(Self {
            client,
            domain_url,
            token,
        })
    }

    fn policy_url(&self, policy_id: &str, tail: &str) -> SyncResult<Url> {
        Ok(self
            .domain_url
            .join(&format!("policy/accesspolicies/{}/{}", policy_id, tail))?)
    }

    /// 发送请求，非 2xx 响应转为 `SyncError::Status`
    async fn send(&self, request: RequestBuilder) -> SyncResult<Response> {
        let response = request.header(AUTH_HEADER, self.token.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::debug!("remote answered {}: {}", status, body);
            return Err(SyncError::Status { status, body });
        }
        Ok(response)
    }
}

fn list_params(query: &ListQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("offset", query.offset.to_string()),
        ("limit", query.limit.to_string()),
        ("expanded", query.expanded.to_string()),
    ];
    if let Some(filter) = &query.filter {
        params.push(("filter", filter.clone()));
    }
    params
}

fn destination_param(destination: &Destination) -> (&'static str, String) {
    match destination {
        Destination::Category(name) => ("category", name.clone()),
        Destination::Section(section) => ("section", section.as_str().to_string()),
    }
}

#[async_trait]
impl PolicyApi for FmcClient {
    async fn list_rules(&self, policy_id: &str, query: &ListQuery) -> SyncResult<Page<RemoteRule>> {
        let url = self.policy_url(policy_id, "accessrules")?;
        let body: ListBody<RuleBody> = self
            .send(self.client.get(url).query(&list_params(query)))
            .await?
            .json()
            .await?;
        body.into_page(RuleBody::into_remote)
    }

    async fn bulk_create_rules(
        &self,
        policy_id: &str,
        destination: &Destination,
        rules: &[Rule],
    ) -> SyncResult<Vec<RemoteRule>> {
        let url = self.policy_url(policy_id, "accessrules")?;
        let params = [("bulk", "true".to_string()), destination_param(destination)];
        let bodies: Vec<RuleBody> = rules.iter().map(RuleBody::from_rule).collect();

        let created: BulkBody<RuleBody> = self
            .send(self.client.post(url).query(&params).json(&bodies))
            .await?
            .json()
            .await?;
        created.into_items().into_iter().map(RuleBody::into_remote).collect()
    }

    async fn bulk_delete_rules(&self, policy_id: &str, filter: &str) -> SyncResult<()> {
        let url = self.policy_url(policy_id, "accessrules")?;
        let params = [("bulk", "true"), ("filter", filter)];
        self.send(self.client.delete(url).query(&params)).await?;
        Ok(())
    }

    async fn list_categories(&self, policy_id: &str, query: &ListQuery) -> SyncResult<Page<Category>> {
        let url = self.policy_url(policy_id, "categories")?;
        let body: ListBody<CategoryBody> = self
            .send(self.client.get(url).query(&list_params(query)))
            .await?
            .json()
            .await?;
        body.into_page(|c| Ok(c.into_category(rulesync_engine::Section::Default)))
    }

    async fn create_category(&self, policy_id: &str, category: &Category) -> SyncResult<Category> {
        let url = self.policy_url(policy_id, "categories")?;
        let params = [("section", category.section.as_str())];
        let created: CategoryBody = self
            .send(
                self.client
                    .post(url)
                    .query(&params)
                    .json(&CategoryBody::from_category(category)),
            )
            .await?
            .json()
            .await?;
        Ok(created.into_category(category.section))
    }

    async fn delete_category(&self, policy_id: &str, category_id: &str) -> SyncResult<()> {
        let url = self.policy_url(policy_id, &format!("categories/{}", category_id))?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }
}
