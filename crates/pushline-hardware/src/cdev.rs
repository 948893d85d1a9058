//! Linux GPIO character device driver.
//!
//! Lines are requested through the v2 character-device ABI with `gpiocdev`.
//! The requested bias is applied by the kernel as part of the request. A
//! line starts without edge detection and is reconfigured in place once
//! `watch_edges` is called, so the same request keeps answering value reads.

use std::fmt;
use std::time::Duration;

use gpiocdev::Request;
use gpiocdev::chip::Chip;
use gpiocdev::line::{self, EdgeDetection, EdgeKind, Value};
use pushline_core::constants::EDGE_WAIT_POLL_INTERVAL_MS;
use pushline_core::{Bias, EdgeDirection, EdgeEvent, EdgeSelector, EdgeTimestamp, RawLevel};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{HardwareError, Result};
use crate::traits::{InputLine, LineDriver, LineRequest};

fn resource_error(context: &str, error: gpiocdev::Error) -> HardwareError {
    HardwareError::resource(format!("{context}: {error}"))
}

fn line_bias(bias: Bias) -> line::Bias {
    match bias {
        Bias::Off => line::Bias::Disabled,
        Bias::PullDown => line::Bias::PullDown,
        Bias::PullUp => line::Bias::PullUp,
    }
}

fn edge_detection(edges: EdgeSelector) -> EdgeDetection {
    match edges {
        EdgeSelector::Rising => EdgeDetection::RisingEdge,
        EdgeSelector::Falling => EdgeDetection::FallingEdge,
        EdgeSelector::Both => EdgeDetection::BothEdges,
    }
}

fn edge_direction(kind: EdgeKind) -> EdgeDirection {
    match kind {
        EdgeKind::Rising => EdgeDirection::Rising,
        EdgeKind::Falling => EdgeDirection::Falling,
    }
}

fn raw_level(value: Value) -> RawLevel {
    match value {
        Value::Active => RawLevel::High,
        Value::Inactive => RawLevel::Low,
    }
}

/// Driver for `/dev/gpiochipN` devices.
#[derive(Debug, Default)]
pub struct CdevDriver;

impl CdevDriver {
    pub fn new() -> Self {
        Self
    }
}

impl LineDriver for CdevDriver {
    type Line = CdevLine;

    fn open(&mut self, request: &LineRequest) -> Result<CdevLine> {
        let chip = Chip::from_path(&request.chip)
            .map_err(|e| resource_error(&format!("open {}", request.chip), e))?;
        let lines = chip
            .info()
            .map_err(|e| resource_error(&format!("query {}", request.chip), e))?
            .num_lines;

        if request.offset >= lines {
            return Err(HardwareError::configuration(format!(
                "line offset {} out of range (chip {} has {} lines)",
                request.offset, request.chip, lines
            )));
        }

        let handle = Request::builder()
            .on_chip(&request.chip)
            .with_consumer(&request.consumer)
            .with_line(request.offset)
            .as_input()
            .with_bias(line_bias(request.bias))
            .request()
            .map_err(|e| resource_error(&format!("request line {request}"), e))?;

        debug!(
            line = %request,
            consumer = %request.consumer,
            bias = %request.bias,
            "Character device line requested"
        );

        Ok(CdevLine {
            offset: request.offset,
            name: request.to_string(),
            handle: Some(handle),
            edges: None,
        })
    }
}

/// Line requested from a character device.
pub struct CdevLine {
    offset: u32,

    /// `chip:offset`, used in error messages.
    name: String,

    /// `None` once released.
    handle: Option<Request>,

    /// Edge selection once detection is enabled.
    edges: Option<EdgeSelector>,
}

impl CdevLine {
    fn handle(&self) -> Result<&Request> {
        self.handle
            .as_ref()
            .ok_or_else(|| HardwareError::not_open(&self.name))
    }
}

impl InputLine for CdevLine {
    fn read_raw(&mut self) -> Result<RawLevel> {
        self.handle()?
            .value(self.offset)
            .map(raw_level)
            .map_err(|e| resource_error(&format!("read line {}", self.name), e))
    }

    fn watch_edges(&mut self, edges: EdgeSelector) -> Result<()> {
        let handle = self.handle()?;

        let mut config = handle.config();
        config
            .with_line(self.offset)
            .with_edge_detection(edge_detection(edges));

        // A refused reconfiguration leaves the request as it was.
        handle
            .reconfigure(&config)
            .map_err(|e| resource_error(&format!("enable edges on {}", self.name), e))?;

        self.edges = Some(edges);
        debug!(line = %self.name, %edges, "Edge detection enabled");
        Ok(())
    }

    fn wait_for_edge(&mut self, cancel: &CancellationToken) -> Result<EdgeEvent> {
        let handle = self.handle()?;
        let Some(edges) = self.edges else {
            return Err(HardwareError::configuration(format!(
                "edge detection is not enabled on line {}",
                self.name
            )));
        };

        let poll = Duration::from_millis(EDGE_WAIT_POLL_INTERVAL_MS);

        loop {
            if cancel.is_cancelled() {
                return Err(HardwareError::Cancelled);
            }

            let ready = handle
                .wait_edge_event(poll)
                .map_err(|e| resource_error(&format!("wait for edge on {}", self.name), e))?;
            if !ready {
                continue;
            }

            let event = handle
                .read_edge_event()
                .map_err(|e| resource_error(&format!("read event on {}", self.name), e))?;

            let direction = edge_direction(event.kind);
            if !edges.matches(direction) {
                continue;
            }

            return Ok(EdgeEvent::new(
                direction,
                EdgeTimestamp::from_nanos(event.timestamp_ns),
            ));
        }
    }

    fn close(&mut self) {
        if self.handle.take().is_some() {
            self.edges = None;
            debug!(line = %self.name, "Character device line released");
        }
    }

    fn is_open(&self) -> bool {
        self.handle.is_some()
    }
}

impl fmt::Debug for CdevLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdevLine")
            .field("name", &self.name)
            .field("open", &self.handle.is_some())
            .field("edges", &self.edges)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bias_is_forwarded() {
        assert_eq!(line_bias(Bias::Off), line::Bias::Disabled);
        assert_eq!(line_bias(Bias::PullDown), line::Bias::PullDown);
        assert_eq!(line_bias(Bias::PullUp), line::Bias::PullUp);
    }

    #[test]
    fn test_edge_detection() {
        assert_eq!(edge_detection(EdgeSelector::Rising), EdgeDetection::RisingEdge);
        assert_eq!(edge_detection(EdgeSelector::Falling), EdgeDetection::FallingEdge);
        assert_eq!(edge_detection(EdgeSelector::Both), EdgeDetection::BothEdges);
    }

    #[test]
    fn test_event_and_value_mapping() {
        assert_eq!(edge_direction(EdgeKind::Rising), EdgeDirection::Rising);
        assert_eq!(edge_direction(EdgeKind::Falling), EdgeDirection::Falling);
        assert_eq!(raw_level(Value::Active), RawLevel::High);
        assert_eq!(raw_level(Value::Inactive), RawLevel::Low);
    }

    #[test]
    fn test_missing_chip_is_resource_error() {
        let mut driver = CdevDriver::new();
        let request = LineRequest::new("/dev/pushline-no-such-chip", 0, Bias::Off);
        let error = driver.open(&request).unwrap_err();
        assert!(error.is_resource());
        assert!(error.to_string().contains("/dev/pushline-no-such-chip"));
    }
}
