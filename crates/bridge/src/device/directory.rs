// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::device::{
    is_burner_feature, Envelope, Feature, FeatureValue, Gateway, Installation, SmartComponent,
};
use crate::error::DeviceError;
use crate::transport::{ApiResponse, AuthorizedRequestClient, RequestConfig};

/// Resource API scoped to the first installation and gateway of the account.
#[derive(Clone)]
pub struct DeviceDirectory {
    client: AuthorizedRequestClient,
    api_endpoint: String,
    installation_id: i64,
    gateway_serial: String,
}

impl DeviceDirectory {
    /// Look up the installation id and gateway serial the bridge works against.
    pub async fn discover(
        client: AuthorizedRequestClient,
        api_endpoint: &str,
    ) -> Result<Self, DeviceError> {
        let api_endpoint = api_endpoint.trim_end_matches('/').to_owned();

        debug!("retrieving installations");
        let url = format!("{api_endpoint}/equipment/installations");
        let installations: Vec<Installation> = get_data(&client, &url, "installations").await?;
        let installation = installations.into_iter().next().ok_or(DeviceError::NoInstallation)?;
        info!(installation_id = installation.id, "retrieved installation");

        debug!("retrieving gateways");
        let url = format!("{api_endpoint}/equipment/installations/{}/gateways", installation.id);
        let gateways: Vec<Gateway> = get_data(&client, &url, "gateways").await?;
        let gateway = gateways.into_iter().next().ok_or(DeviceError::NoGateway)?;
        info!(gateway_serial = %gateway.serial, "retrieved gateway");

        Ok(Self {
            client,
            api_endpoint,
            installation_id: installation.id,
            gateway_serial: gateway.serial,
        })
    }

    pub fn installation_id(&self) -> i64 {
        self.installation_id
    }

    pub fn gateway_serial(&self) -> &str {
        &self.gateway_serial
    }

    pub async fn smart_components(&self) -> Result<Vec<SmartComponent>, DeviceError> {
        let components: Vec<SmartComponent> =
            get_data(&self.client, &self.smart_components_url(), "smart components").await?;
        for c in &components {
            debug!(id = %c.id, name = %c.name, selected = c.selected, deleted = c.deleted, "smart component");
        }
        Ok(components)
    }

    /// Replace the selected smart components with `ids`.
    pub async fn select_smart_components(
        &self,
        ids: &[String],
    ) -> Result<Vec<SmartComponent>, DeviceError> {
        let config = RequestConfig::json(serde_json::json!({ "selected": ids }));
        let resp = self.client.call(Method::PUT, &self.smart_components_url(), config).await?;
        let resp = ensure_success(resp, "select smart components")?;
        let body: Envelope<Vec<SmartComponent>> = resp.json()?;
        info!(count = body.data.len(), "selected smart components");
        Ok(body.data)
    }

    pub async fn feature(&self, device_id: &str, feature: &str) -> Result<Feature, DeviceError> {
        let url = self.feature_url(device_id, feature);
        debug!(url, "fetching feature");
        let resp = ensure_success(self.client.get(&url).await?, "feature read")?;
        Ok(Feature::from_body(&resp.body)?)
    }

    /// Read the value the bridge reports for `feature`: burner on/off state
    /// for burner features, a temperature otherwise.
    pub async fn current_value(
        &self,
        device_id: &str,
        feature: &str,
    ) -> Result<FeatureValue, DeviceError> {
        let data = self.feature(device_id, feature).await?;
        let value = if is_burner_feature(feature) {
            data.active().map(FeatureValue::Active)
        } else {
            data.temperature().map(FeatureValue::Temperature)
        };
        value.ok_or_else(|| DeviceError::UnexpectedStructure {
            feature: feature.to_owned(),
            body: serde_json::to_string(&data.properties).unwrap_or_default(),
        })
    }

    /// Execute `command` on a feature with a JSON parameter object.
    pub async fn execute_command(
        &self,
        device_id: &str,
        feature: &str,
        command: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, DeviceError> {
        let url = format!("{}/commands/{command}", self.feature_url(device_id, feature));
        info!(feature, command, "executing feature command");
        let resp = self.client.call(Method::POST, &url, RequestConfig::json(params)).await?;
        let resp = ensure_success(resp, "feature command")?;
        if resp.body.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(resp.json()?)
    }

    fn smart_components_url(&self) -> String {
        format!("{}/equipment/installations/{}/smartComponents", self.api_endpoint, self.installation_id)
    }

    fn feature_url(&self, device_id: &str, feature: &str) -> String {
        format!(
            "{}/features/installations/{}/gateways/{}/devices/{device_id}/features/{feature}",
            self.api_endpoint, self.installation_id, self.gateway_serial
        )
    }
}

async fn get_data<T: DeserializeOwned>(
    client: &AuthorizedRequestClient,
    url: &str,
    what: &'static str,
) -> Result<T, DeviceError> {
    let resp = ensure_success(client.get(url).await?, what)?;
    let body: Envelope<T> = resp.json()?;
    Ok(body.data)
}

fn ensure_success(resp: ApiResponse, what: &'static str) -> Result<ApiResponse, DeviceError> {
    if resp.is_success() {
        return Ok(resp);
    }
    Err(DeviceError::Api { what, status: resp.status, body: resp.text() })
}

#[cfg(test)]
#[path = "directory_tests.rs"]
mod tests;
