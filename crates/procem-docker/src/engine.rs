use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use procem_core::{ContainerEngine, CreateUnit, EngineError, RunningUnit, UnitHandle};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::DockerError;

/// Engine API version every request is pinned to.
pub const API_VERSION: &str = "v1.40";

#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Engine base URL, e.g. `http://localhost:2375`.
    pub host: String,
    pub api_version: String,
}

impl DockerConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            api_version: API_VERSION.to_string(),
        }
    }
}

/// [`ContainerEngine`] over the Docker Engine HTTP API.
pub struct DockerEngine {
    client: Client,
    base: String,
    closed: AtomicBool,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateBody<'a> {
    image: &'a str,
    env: &'a [String],
    host_config: HostConfig<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    networking_config: Option<NetworkingConfig<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct HostConfig<'a> {
    auto_remove: bool,
    binds: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkingConfig<'a> {
    endpoints_config: BTreeMap<&'a str, EndpointConfig>,
}

#[derive(Serialize)]
struct EndpointConfig {}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ConnectBody<'a> {
    container: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreatedBody {
    id: String,
    #[serde(default)]
    warnings: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerSummary {
    id: String,
    #[serde(default)]
    names: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl DockerEngine {
    pub fn new(config: DockerConfig) -> Result<Self, DockerError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base: format!(
                "{}/{}",
                config.host.trim_end_matches('/'),
                config.api_version.trim_matches('/')
            ),
            closed: AtomicBool::new(false),
        })
    }

    fn url(&self, path: &str) -> Result<String, DockerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DockerError::Closed);
        }
        Ok(format!("{}{}", self.base, path))
    }

    async fn list(&self) -> Result<Vec<RunningUnit>, DockerError> {
        let response = self.client.get(self.url("/containers/json")?).send().await?;
        let summaries: Vec<ContainerSummary> = check(response, &[200]).await?.json().await?;

        Ok(summaries
            .into_iter()
            .flat_map(|c| {
                let id = c.id;
                c.names.into_iter().map(move |name| RunningUnit {
                    id: id.clone(),
                    name: name.trim_start_matches('/').to_string(),
                })
            })
            .collect())
    }

    async fn try_create(&self, request: &CreateUnit) -> Result<UnitHandle, DockerError> {
        let body = CreateBody {
            image: &request.image,
            env: &request.env,
            host_config: HostConfig {
                auto_remove: request.auto_remove,
                binds: &request.binds,
            },
            networking_config: request.primary_network.as_deref().map(|net| NetworkingConfig {
                endpoints_config: BTreeMap::from([(net, EndpointConfig {})]),
            }),
        };
        let url = self.url(&format!("/containers/create?name={}", request.name))?;
        let response = self.client.post(url).json(&body).send().await?;
        let created: CreatedBody = check(response, &[201]).await?.json().await?;

        for warning in created.warnings.unwrap_or_default() {
            warn!(unit = %request.name, warning = %warning, "engine warning on create");
        }
        if created.id.is_empty() {
            return Err(DockerError::InvalidResponse("create returned no id".into()));
        }
        Ok(UnitHandle {
            id: created.id,
            name: request.name.clone(),
        })
    }

    async fn force_remove(&self, unit: &str) -> Result<(), DockerError> {
        let url = self.url(&format!("/containers/{unit}?force=true"))?;
        let response = self.client.delete(url).send().await?;
        // 404: already gone; 409: auto-removal already in progress
        check(response, &[200, 204, 404, 409]).await?;
        Ok(())
    }
}

/// Pass through responses with an accepted status; turn the rest into errors.
async fn check(response: Response, accepted: &[u16]) -> Result<Response, DockerError> {
    let status = response.status().as_u16();
    if accepted.contains(&status) {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.message)
        .unwrap_or(body);
    Err(DockerError::Status { status, message })
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn list_running(&self) -> Result<Vec<RunningUnit>, EngineError> {
        Ok(self.list().await?)
    }

    async fn create(&self, request: &CreateUnit) -> Result<UnitHandle, EngineError> {
        match self.try_create(request).await {
            Err(DockerError::Status { status: 409, .. }) => {
                debug!(unit = %request.name, "replacing existing unit with the same name");
                self.force_remove(&request.name).await?;
                Ok(self.try_create(request).await?)
            }
            other => Ok(other?),
        }
    }

    async fn attach_network(&self, unit: &str, network: &str) -> Result<(), EngineError> {
        let url = self.url(&format!("/networks/{network}/connect"))?;
        let response = self
            .client
            .post(url)
            .json(&ConnectBody { container: unit })
            .send()
            .await
            .map_err(DockerError::from)?;
        check(response, &[200]).await?;
        Ok(())
    }

    async fn start(&self, unit: &UnitHandle) -> Result<(), EngineError> {
        let url = self.url(&format!("/containers/{}/start", unit.id))?;
        let response = self.client.post(url).send().await.map_err(DockerError::from)?;
        // 304: already started
        check(response, &[204, 304]).await?;
        Ok(())
    }

    async fn stop(&self, unit: &str) -> Result<(), EngineError> {
        let url = self.url(&format!("/containers/{unit}/stop"))?;
        let response = self.client.post(url).send().await.map_err(DockerError::from)?;
        check(response, &[204, 304, 404]).await?;
        Ok(())
    }

    async fn remove(&self, unit: &str) -> Result<(), EngineError> {
        Ok(self.force_remove(unit).await?)
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, method, path, query_param},
    };

    use super::*;

    fn engine(server: &MockServer) -> DockerEngine {
        DockerEngine::new(DockerConfig::new(server.uri())).unwrap()
    }

    fn request() -> CreateUnit {
        CreateUnit {
            name: "Sim00_Load_1".into(),
            image: "procem/load:0.3".into(),
            env: vec!["SIMULATION_ID=x".into()],
            primary_network: Some("platform".into()),
            binds: vec!["logs:/logs".into()],
            auto_remove: true,
        }
    }

    #[tokio::test]
    async fn lists_running_names_without_slash() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.40/containers/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"Id": "a1", "Names": ["/Sim00_log_writer"], "State": "running"},
                {"Id": "b2", "Names": ["/rabbitmq"]}
            ])))
            .mount(&server)
            .await;

        let units = engine(&server).list_running().await.unwrap();
        let names: Vec<&str> = units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["Sim00_log_writer", "rabbitmq"]);
        assert_eq!(units[0].id, "a1");
    }

    #[tokio::test]
    async fn create_sends_the_container_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1.40/containers/create"))
            .and(query_param("name", "Sim00_Load_1"))
            .and(body_partial_json(json!({
                "Image": "procem/load:0.3",
                "Env": ["SIMULATION_ID=x"],
                "HostConfig": {"AutoRemove": true, "Binds": ["logs:/logs"]},
                "NetworkingConfig": {"EndpointsConfig": {"platform": {}}}
            })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"Id": "c0ffee", "Warnings": []})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let handle = engine(&server).create(&request()).await.unwrap();
        assert_eq!(handle.id, "c0ffee");
        assert_eq!(handle.name, "Sim00_Load_1");
    }

    #[tokio::test]
    async fn create_without_network_omits_networking_config() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1.40/containers/create"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"Id": "n0net"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut request = request();
        request.primary_network = None;
        engine(&server).create(&request).await.unwrap();

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert!(body.get("NetworkingConfig").is_none());
        assert_eq!(body["HostConfig"]["AutoRemove"], true);
    }

    #[tokio::test]
    async fn create_replaces_a_conflicting_unit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1.40/containers/create"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({"message": "name in use"})))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1.40/containers/Sim00_Load_1"))
            .and(query_param("force", "true"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1.40/containers/create"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"Id": "fresh"})))
            .mount(&server)
            .await;

        let handle = engine(&server).create(&request()).await.unwrap();
        assert_eq!(handle.id, "fresh");
    }

    #[tokio::test]
    async fn errors_carry_the_engine_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1.40/containers/create"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "no such image"})),
            )
            .mount(&server)
            .await;

        let err = engine(&server).create(&request()).await.unwrap_err();
        assert_eq!(err, EngineError::NotFound("no such image".into()));
    }

    #[tokio::test]
    async fn attach_start_stop_remove() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1.40/networks/bus_net/connect"))
            .and(body_partial_json(json!({"Container": "Sim00_Load_1"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1.40/containers/c0ffee/start"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1.40/containers/Sim00_Load_1/stop"))
            .respond_with(ResponseTemplate::new(304))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1.40/containers/Sim00_Load_1"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "gone"})))
            .mount(&server)
            .await;

        let engine = engine(&server);
        engine.attach_network("Sim00_Load_1", "bus_net").await.unwrap();
        engine
            .start(&UnitHandle {
                id: "c0ffee".into(),
                name: "Sim00_Load_1".into(),
            })
            .await
            .unwrap();
        engine.stop("Sim00_Load_1").await.unwrap();
        engine.remove("Sim00_Load_1").await.unwrap();
    }

    #[tokio::test]
    async fn closed_client_refuses_calls() {
        let server = MockServer::start().await;
        let engine = engine(&server);
        engine.close().await.unwrap();
        assert_eq!(engine.list_running().await.unwrap_err(), EngineError::Closed);
    }

    #[test]
    fn base_url_is_normalized() {
        let engine = DockerEngine::new(DockerConfig::new("http://engine:2375/")).unwrap();
        assert_eq!(
            engine.url("/containers/json").unwrap(),
            "http://engine:2375/v1.40/containers/json"
        );
    }
}
