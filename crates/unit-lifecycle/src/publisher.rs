//! Endpoint publishing into the relation registry.
//!
//! Consumers (load balancers) read this unit's databag to find the service.
//! Each publish replaces the unit's previous data wholesale so that no field
//! from an older record can survive a partial update.

use crate::context::{UnitContext, UnitIdentity};
use crate::error::{Error, ParseError, Result};
use crate::registry::{Databag, RelationId, RelationRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Backend server line: `[name, address, port, "check"]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry(pub String, pub String, pub u16, pub String);

impl ServerEntry {
    /// A health-checked server entry
    pub fn checked(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self(name.into(), address.into(), port, "check".to_string())
    }
}

/// Service description consumed by load balancers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Name of the balanced service
    pub service_name: String,
    /// Address the service binds to
    pub service_host: String,
    /// Port the service listens on
    pub service_port: u16,
    /// Load-balancer options
    pub service_options: Vec<String>,
    /// Backend servers
    pub servers: Vec<ServerEntry>,
}

/// Everything this unit publishes about its endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRecord {
    /// Address consumers connect to
    pub hostname: String,
    /// Port consumers connect to
    pub port: u16,
    /// Structured service description
    pub services: ServiceSpec,
}

impl EndpointRecord {
    /// Derive the record from the current context
    pub fn for_unit(ctx: &UnitContext, service_name: &str, service_options: &[String]) -> Self {
        let port = ctx.desired.port;
        Self {
            hostname: ctx.private_address.clone(),
            port,
            services: ServiceSpec {
                service_name: service_name.to_string(),
                service_host: ctx.desired.bind_address.clone(),
                service_port: port,
                service_options: service_options.to_vec(),
                servers: vec![ServerEntry::checked(
                    ctx.unit.server_name(service_name),
                    ctx.private_address.clone(),
                    port,
                )],
            },
        }
    }

    /// Flatten into relation keys; `services` becomes a YAML blob
    pub fn to_databag(&self) -> Result<Databag> {
        let services = serde_yaml::to_string(&self.services)
            .map_err(|e| Error::PublishFailed(format!("cannot encode services: {}", e)))?;

        let mut databag = Databag::new();
        databag.insert("hostname".to_string(), self.hostname.clone());
        databag.insert("port".to_string(), self.port.to_string());
        databag.insert("services".to_string(), services);
        Ok(databag)
    }

    /// Rebuild a record from relation keys
    pub fn from_databag(databag: &Databag) -> Result<Self> {
        let field = |key: &str| {
            databag.get(key).ok_or_else(|| ParseError::Yaml {
                key: key.to_string(),
                reason: "missing".to_string(),
            })
        };
        let port_text = field("port")?;
        let port: u16 = port_text
            .parse()
            .map_err(|_| ParseError::PortSpec(port_text.clone()))?;
        let services = serde_yaml::from_str(field("services")?).map_err(|e| ParseError::Yaml {
            key: "services".to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            hostname: field("hostname")?.clone(),
            port,
            services,
        })
    }
}

/// Publishes this unit's [`EndpointRecord`] on relations of one endpoint
#[derive(Clone)]
pub struct EndpointPublisher {
    registry: Arc<dyn RelationRegistry>,
    endpoint: String,
    unit: UnitIdentity,
}

impl EndpointPublisher {
    /// Create a publisher for `unit` on relations of `endpoint`
    pub fn new(
        registry: Arc<dyn RelationRegistry>,
        endpoint: impl Into<String>,
        unit: UnitIdentity,
    ) -> Self {
        Self {
            registry,
            endpoint: endpoint.into(),
            unit,
        }
    }

    /// Relations currently established on the endpoint
    pub async fn relations(&self) -> Result<Vec<RelationId>> {
        self.registry.relation_ids(&self.endpoint).await
    }

    /// Replace this unit's data on `relation` with `record`
    ///
    /// Keys left over from an earlier publish are deleted in the same write.
    pub async fn publish(&self, record: &EndpointRecord, relation: &RelationId) -> Result<()> {
        self.log_peers(relation).await;

        let previous = self.registry.read(relation, self.unit.as_str()).await?;
        let mut changes = record.to_databag()?;
        for key in previous.keys() {
            changes.entry(key.clone()).or_default();
        }

        self.registry.write(relation, &changes).await?;
        info!(
            "Published {}:{} on {} for {}",
            record.hostname, record.port, relation, self.unit
        );
        Ok(())
    }

    /// Publish `record` on every relation of the endpoint, returning how many
    pub async fn republish(&self, record: &EndpointRecord) -> Result<usize> {
        let relations = self.relations().await?;
        for relation in &relations {
            self.publish(record, relation).await?;
        }
        Ok(relations.len())
    }

    async fn log_peers(&self, relation: &RelationId) {
        let units = match self.registry.related_units(relation).await {
            Ok(units) => units,
            Err(e) => {
                warn!("Cannot list units on {}: {}", relation, e);
                return;
            }
        };
        for unit in units {
            match self.registry.read(relation, &unit).await {
                Ok(data) => debug!("{} on {}: {:?}", unit, relation, data),
                Err(e) => warn!("Cannot read {} on {}: {}", unit, relation, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DesiredState;
    use crate::registry::MemoryRegistry;

    fn context(port: u16) -> UnitContext {
        UnitContext::new(
            UnitIdentity::new("microsample/0"),
            DesiredState {
                port,
                bind_address: "0.0.0.0".to_string(),
                package_channel: "edge".to_string(),
            },
            "10.0.0.7",
        )
    }

    fn options() -> Vec<String> {
        vec!["mode http".to_string(), "balance leastconn".to_string()]
    }

    #[test]
    fn test_record_contents() {
        let record = EndpointRecord::for_unit(&context(9090), "microsample", &options());

        assert_eq!(record.hostname, "10.0.0.7");
        assert_eq!(record.port, 9090);
        assert_eq!(record.services.service_host, "0.0.0.0");
        assert_eq!(
            record.services.servers,
            vec![ServerEntry::checked("microsample_unit_microsample-0", "10.0.0.7", 9090)]
        );
    }

    #[test]
    fn test_databag_encoding() {
        let record = EndpointRecord::for_unit(&context(9090), "microsample", &options());
        let databag = record.to_databag().unwrap();

        assert_eq!(databag["port"], "9090");
        assert!(databag["services"].contains("service_name: microsample"));
        assert!(databag["services"].contains("- check"));
        assert_eq!(EndpointRecord::from_databag(&databag).unwrap(), record);
    }

    #[test]
    fn test_from_databag_rejects_garbage() {
        let mut databag = EndpointRecord::for_unit(&context(9090), "microsample", &options())
            .to_databag()
            .unwrap();
        databag.insert("port".to_string(), "ninety".to_string());
        assert!(matches!(
            EndpointRecord::from_databag(&databag),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_publish_overwrites_previous_record() {
        smol::block_on(async {
            let registry = Arc::new(MemoryRegistry::new("microsample/0"));
            let relation = RelationId::new("website:1");
            registry.add_relation("website", &relation);

            // Something an older agent left behind
            let mut legacy = Databag::new();
            legacy.insert("legacy".to_string(), "yes".to_string());
            registry.write(&relation, &legacy).await.unwrap();

            let publisher = EndpointPublisher::new(
                registry.clone(),
                "website",
                UnitIdentity::new("microsample/0"),
            );

            let a = EndpointRecord::for_unit(&context(8080), "microsample", &options());
            let b = EndpointRecord::for_unit(&context(9090), "microsample", &[]);
            publisher.publish(&a, &relation).await.unwrap();
            publisher.publish(&b, &relation).await.unwrap();

            let data = registry.local_data(&relation);
            assert_eq!(data, b.to_databag().unwrap());
            assert!(!data.contains_key("legacy"));
            assert_eq!(EndpointRecord::from_databag(&data).unwrap(), b);
        });
    }

    #[test]
    fn test_republish_covers_every_relation() {
        smol::block_on(async {
            let registry = Arc::new(MemoryRegistry::new("microsample/0"));
            let first = RelationId::new("website:1");
            let second = RelationId::new("website:2");
            registry.add_relation("website", &first);
            registry.add_relation("website", &second);
            registry.add_relation("metrics", &RelationId::new("metrics:3"));

            let publisher = EndpointPublisher::new(
                registry.clone(),
                "website",
                UnitIdentity::new("microsample/0"),
            );
            let record = EndpointRecord::for_unit(&context(9090), "microsample", &options());

            assert_eq!(publisher.republish(&record).await.unwrap(), 2);
            assert_eq!(registry.local_data(&first)["port"], "9090");
            assert_eq!(registry.local_data(&second)["port"], "9090");
            assert!(registry.local_data(&RelationId::new("metrics:3")).is_empty());
        });
    }
}
