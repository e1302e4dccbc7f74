//! The `viewOverride` command.
//!
//! ```text
//! viewOverride -q -t            query the active target index
//! viewOverride -t 2             show AuxiliaryNormals in the debug quad
//! viewOverride -r               recompile pass shaders
//! viewOverride -c 1 0 0 1       show only red and alpha
//! ```
//!
//! Long forms (`-query`, `-target`, `-refresh`, `-channel`) are accepted and
//! flags can be combined in one invocation.

use std::rc::Rc;

use crate::error::{OverrideError, Result};
use crate::host::ViewportRefresh;
use crate::pipeline::{ChannelMask, SharedPipeline};

/// Name the command is registered under.
pub const COMMAND_NAME: &str = "viewOverride";

/// One parsed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    QueryActiveTarget,
    SetActiveTarget(u32),
    RefreshShaders,
    SetChannels(ChannelMask),
}

impl ControlRequest {
    fn mutates(&self) -> bool {
        !matches!(self, ControlRequest::QueryActiveTarget)
    }
}

/// Parses the command's arguments, without the command name.
pub fn parse_command(args: &[&str]) -> Result<Vec<ControlRequest>> {
    let query = args.iter().any(|a| matches!(*a, "-q" | "-query"));
    let mut requests = Vec::new();
    let mut args = args.iter().copied();

    while let Some(flag) = args.next() {
        match flag {
            "-q" | "-query" => {}
            "-t" | "-target" if query => requests.push(ControlRequest::QueryActiveTarget),
            "-t" | "-target" => {
                let value = next_value(&mut args, flag)?;
                let index = value.parse::<u32>().map_err(|_| {
                    OverrideError::InvalidCommand(format!(
                        "{flag} expects an unsigned integer, got '{value}'"
                    ))
                })?;
                requests.push(ControlRequest::SetActiveTarget(index));
            }
            "-r" | "-refresh" => requests.push(ControlRequest::RefreshShaders),
            "-c" | "-channel" => {
                let mut channel = || -> Result<bool> { parse_bool(next_value(&mut args, flag)?) };
                let mask = ChannelMask::new(channel()?, channel()?, channel()?, channel()?);
                requests.push(ControlRequest::SetChannels(mask));
            }
            other => {
                return Err(OverrideError::InvalidCommand(format!("unknown flag '{other}'")));
            }
        }
    }

    if query && requests.is_empty() {
        return Err(OverrideError::InvalidCommand(
            "-query needs a flag to query (-target)".into(),
        ));
    }
    if requests.is_empty() {
        return Err(OverrideError::InvalidCommand("no flags given".into()));
    }
    Ok(requests)
}

fn next_value<'a>(args: &mut impl Iterator<Item = &'a str>, flag: &str) -> Result<&'a str> {
    args.next()
        .ok_or_else(|| OverrideError::InvalidCommand(format!("{flag} is missing an argument")))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(OverrideError::InvalidCommand(format!("expected a boolean, got '{value}'"))),
    }
}

/// Applies control requests to a pipeline and schedules a redraw.
#[derive(Clone)]
pub struct ControlSurface {
    pipeline: SharedPipeline,
    refresh: Rc<dyn ViewportRefresh>,
}

impl ControlSurface {
    pub fn new(pipeline: SharedPipeline, refresh: Rc<dyn ViewportRefresh>) -> Self {
        Self { pipeline, refresh }
    }

    pub fn pipeline(&self) -> &SharedPipeline {
        &self.pipeline
    }

    /// Runs the command. Returns the active target index for queries.
    pub fn execute(&self, args: &[&str]) -> Result<Option<u32>> {
        let requests = parse_command(args)?;
        let mut result = None;

        {
            let mut pipeline = self.pipeline.borrow_mut();
            for request in &requests {
                match *request {
                    ControlRequest::QueryActiveTarget => {
                        result = Some(pipeline.active_target().index() as u32);
                    }
                    ControlRequest::SetActiveTarget(index) => pipeline.change_active_target(index),
                    ControlRequest::RefreshShaders => pipeline.reset_shader_instances(),
                    ControlRequest::SetChannels(mask) => pipeline.set_channel_mask(mask),
                }
            }
        }

        if requests.iter().any(ControlRequest::mutates) {
            self.refresh.schedule_refresh_all();
        }
        Ok(result)
    }

    /// Runs a whitespace-separated command line. A leading command name is
    /// skipped.
    pub fn execute_line(&self, line: &str) -> Result<Option<u32>> {
        let mut args: Vec<&str> = line.split_whitespace().collect();
        if args.first() == Some(&COMMAND_NAME) {
            args.remove(0);
        }
        self.execute(&args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverrideConfig;
    use crate::headless::{CountingRefresh, HeadlessRenderer};
    use crate::pipeline::PipelineController;
    use crate::render_targets::TargetRole;

    fn surface() -> (ControlSurface, Rc<CountingRefresh>) {
        let renderer = Rc::new(HeadlessRenderer::new());
        let pipeline = PipelineController::new(renderer, OverrideConfig::default()).shared();
        let refresh = Rc::new(CountingRefresh::default());
        (ControlSurface::new(pipeline, refresh.clone()), refresh)
    }

    // ── parsing ───────────────────────────────────────────────────────────

    #[test]
    fn parses_short_and_long_forms() {
        assert_eq!(
            parse_command(&["-t", "2"]).unwrap(),
            [ControlRequest::SetActiveTarget(2)]
        );
        assert_eq!(
            parse_command(&["-target", "1", "-refresh"]).unwrap(),
            [ControlRequest::SetActiveTarget(1), ControlRequest::RefreshShaders]
        );
        assert_eq!(
            parse_command(&["-query", "-target"]).unwrap(),
            [ControlRequest::QueryActiveTarget]
        );
    }

    #[test]
    fn parses_channel_booleans() {
        assert_eq!(
            parse_command(&["-c", "1", "false", "on", "0"]).unwrap(),
            [ControlRequest::SetChannels(ChannelMask::new(true, false, true, false))]
        );
    }

    #[test]
    fn rejects_malformed_input() {
        for args in [
            &[][..],
            &["-t"][..],
            &["-t", "red"][..],
            &["-t", "-1"][..],
            &["-c", "1", "1", "1"][..],
            &["-c", "1", "1", "1", "maybe"][..],
            &["-x"][..],
            &["-q"][..],
        ] {
            assert!(
                matches!(parse_command(args), Err(OverrideError::InvalidCommand(_))),
                "accepted {args:?}"
            );
        }
    }

    // ── execution ─────────────────────────────────────────────────────────

    #[test]
    fn set_then_query_target() {
        let (surface, refresh) = surface();

        assert_eq!(surface.execute(&["-t", "1"]).unwrap(), None);
        assert_eq!(surface.execute(&["-q", "-t"]).unwrap(), Some(1));

        assert_eq!(surface.pipeline().borrow().active_target(), TargetRole::Depth);
        assert_eq!(refresh.count(), 1);
    }

    #[test]
    fn query_does_not_refresh() {
        let (surface, refresh) = surface();
        surface.execute_line("viewOverride -q -t").unwrap();
        assert_eq!(refresh.count(), 0);
    }

    #[test]
    fn channels_reach_pipeline() {
        let (surface, _) = surface();
        surface.execute_line("-c 0 1 0 1").unwrap();
        assert_eq!(
            surface.pipeline().borrow().channel_mask(),
            ChannelMask::new(false, true, false, true)
        );
    }

    #[test]
    fn out_of_range_target_still_refreshes() {
        let (surface, refresh) = surface();
        surface.execute(&["-t", "7"]).unwrap();
        assert_eq!(surface.pipeline().borrow().active_target(), TargetRole::Color);
        assert_eq!(refresh.count(), 1);
    }

    #[test]
    fn invalid_command_changes_nothing() {
        let (surface, refresh) = surface();
        assert!(surface.execute(&["-t", "1", "-bogus"]).is_err());
        assert_eq!(surface.pipeline().borrow().active_target(), TargetRole::Color);
        assert_eq!(refresh.count(), 0);
    }
}
