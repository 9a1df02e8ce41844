//! Mocked function-calling examples
//!
//! Stand-ins for the kind of functions a model is usually handed: an age
//! calculator, a weather lookup and a database query. The lookups return
//! canned data so the tools are deterministic.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Datelike;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use crate::error::{Result, ToolError};
use crate::mcp::tools::{parse_args, parse_validated_args, Tool, ToolRegistry};
use crate::mcp::types::CallToolResult;
use crate::schema::generate_schema;

/// Rows returned by `search_database` never exceed this
const MAX_MOCK_ROWS: u32 = 5;

pub fn register(registry: &mut ToolRegistry, latency: Duration) {
    registry
        .register(CalculateAge)
        .register(GetWeather { latency })
        .register(SearchDatabase { latency });
}

pub struct CalculateAge;

#[derive(Debug, Deserialize, JsonSchema)]
struct CalculateAgeArgs {
    /// The year the person was born
    birth_year: i32,
    /// The current year (defaults to this year)
    current_year: Option<i32>,
}

pub fn calculate_age(birth_year: i32, current_year: i32) -> std::result::Result<i32, ToolError> {
    if birth_year > current_year {
        return Err(ToolError::BirthYearInFuture);
    }
    current_year
        .checked_sub(birth_year)
        .ok_or(ToolError::AgeOutOfRange { birth_year })
}

#[async_trait]
impl Tool for CalculateAge {
    fn name(&self) -> &'static str {
        "calculate_age"
    }

    fn description(&self) -> &'static str {
        "Calculate a person's age given their birth year"
    }

    fn input_schema(&self) -> Value {
        generate_schema::<CalculateAgeArgs>()
    }

    async fn call(&self, args: Value) -> Result<CallToolResult> {
        let args: CalculateAgeArgs = parse_args(args)?;
        let current_year = args
            .current_year
            .unwrap_or_else(|| chrono::Utc::now().year());

        let age = calculate_age(args.birth_year, current_year)?;
        Ok(CallToolResult::text(json!({ "age": age }).to_string()))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeatherReport {
    pub city: String,
    pub temperature: i32,
    pub units: TemperatureUnit,
    pub condition: &'static str,
    pub humidity: u8,
}

pub fn mock_weather(city: &str, units: TemperatureUnit) -> WeatherReport {
    WeatherReport {
        city: city.to_string(),
        temperature: match units {
            TemperatureUnit::Celsius => 22,
            TemperatureUnit::Fahrenheit => 72,
        },
        units,
        condition: "sunny",
        humidity: 65,
    }
}

pub struct GetWeather {
    latency: Duration,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct GetWeatherArgs {
    /// The name of the city
    city: String,
    /// Temperature units
    #[serde(default)]
    units: TemperatureUnit,
}

#[async_trait]
impl Tool for GetWeather {
    fn name(&self) -> &'static str {
        "get_weather"
    }

    fn description(&self) -> &'static str {
        "Get current weather information for a city"
    }

    fn input_schema(&self) -> Value {
        generate_schema::<GetWeatherArgs>()
    }

    async fn call(&self, args: Value) -> Result<CallToolResult> {
        let args: GetWeatherArgs = parse_args(args)?;
        simulate_latency(self.latency).await;

        let report = mock_weather(&args.city, args.units);
        Ok(CallToolResult::text(serde_json::to_string_pretty(&report)?))
    }
}

pub struct SearchDatabase {
    latency: Duration,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
struct SearchDatabaseArgs {
    /// Search query string
    #[validate(length(min = 1))]
    query: String,
    /// Database table to search
    #[validate(length(min = 1))]
    table: String,
    /// Maximum number of results to return
    #[validate(range(min = 1, max = 100))]
    limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRow {
    pub id: u32,
    pub title: String,
    pub table: String,
}

pub fn mock_search(query: &str, table: &str, limit: u32) -> Vec<SearchRow> {
    (1..=limit.min(MAX_MOCK_ROWS))
        .map(|id| SearchRow {
            id,
            title: format!("Result {} for '{}'", id, query),
            table: table.to_string(),
        })
        .collect()
}

#[async_trait]
impl Tool for SearchDatabase {
    fn name(&self) -> &'static str {
        "search_database"
    }

    fn description(&self) -> &'static str {
        "Search for records in a database table"
    }

    fn input_schema(&self) -> Value {
        generate_schema::<SearchDatabaseArgs>()
    }

    async fn call(&self, args: Value) -> Result<CallToolResult> {
        let args: SearchDatabaseArgs = parse_validated_args(args)?;
        simulate_latency(self.latency).await;

        let rows = mock_search(&args.query, &args.table, args.limit.unwrap_or(10));
        Ok(CallToolResult::text(serde_json::to_string_pretty(&rows)?))
    }
}

async fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}
