// Actuator HTTP client
//
// Sets the `Tripped` variable on a Vera security-sensor device through the
// controller's `data_request` endpoint. One GET per call, no retries.

use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

const SECURITY_SENSOR_SERVICE: &str = "urn:micasaverde-com:serviceId:SecuritySensor1";

/// Client for the home-automation actuator.
#[derive(Debug, Clone)]
pub struct ActuatorClient {
    http: reqwest::Client,
}

impl ActuatorClient {
    /// Build a client; `transport` should carry a request timeout so a hung
    /// controller can't pin a notification task forever.
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
        })
    }

    /// Wrap a pre-built `reqwest::Client` (used by tests).
    pub fn from_reqwest(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Build the variable-set URL for a device.
    pub fn tripped_url(host: &str, port: u16, device_id: &str, tripped: bool) -> Result<Url, Error> {
        let value = u8::from(tripped);
        let raw = format!(
            "http://{host}:{port}/data_request?id=variableset&DeviceNum={device_id}&serviceId={SECURITY_SENSOR_SERVICE}&Variable=Tripped&Value={value}"
        );
        Ok(Url::parse(&raw)?)
    }

    /// Set the device's `Tripped` variable.
    pub async fn set_tripped(
        &self,
        host: &str,
        port: u16,
        device_id: &str,
        tripped: bool,
    ) -> Result<(), Error> {
        let url = Self::tripped_url(host, port, device_id, tripped)?;
        tracing::debug!(url = %url, "Sending actuator request");

        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(())
    }
}
