//! Weather handler.

use async_trait::async_trait;
use christopher_kernel::{Handler, HandlerContext, HandlerError, HandlerOutput};

pub const WEATHER_ID: &str = "weather";

pub const WEATHER_DESCRIPTION: &str =
    "A weather agent that provides current weather information and forecasts";

/// The report returned for every weather query.
pub const WEATHER_REPORT: &str = "The weather today is sunny with a high of 25°C.";

/// Answers weather questions with a fixed report.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeatherHandler;

#[async_trait]
impl Handler for WeatherHandler {
    fn id(&self) -> &str {
        WEATHER_ID
    }

    fn description(&self) -> &str {
        WEATHER_DESCRIPTION
    }

    async fn run(
        &self,
        _input: &str,
        _context: &HandlerContext,
    ) -> Result<HandlerOutput, HandlerError> {
        Ok(WEATHER_REPORT.into())
    }
}
