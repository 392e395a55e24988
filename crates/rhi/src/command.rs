//! Backend-neutral command recording.
//!
//! A [`CommandList`] is what a frame records between "begin" and "end". The
//! driver receives it at submission time, so the same recording logic serves
//! every backend.
//!
//! # Example
//!
//! ```
//! use forge_rhi::command::CommandList;
//! use forge_rhi::types::{Extent2D, Rect2D, Viewport};
//!
//! let extent = Extent2D::new(800, 600);
//! let mut list = CommandList::new();
//! list.begin().unwrap();
//! list.begin_pass(0, extent, [0.0, 0.0, 0.0, 1.0]).unwrap();
//! list.set_viewport(Viewport::full(extent)).unwrap();
//! list.set_scissor(Rect2D::full(extent)).unwrap();
//! list.draw(3, 1, 0, 0).unwrap();
//! list.end_pass().unwrap();
//! list.end().unwrap();
//! assert!(list.is_executable());
//! ```

use crate::error::{RhiError, RhiResult};
use crate::types::{Extent2D, Rect2D, Viewport};

/// A single recorded command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Start rendering into the target with the given raw id, clearing it.
    BeginPass {
        target: u64,
        extent: Extent2D,
        clear: [f32; 4],
    },
    SetViewport(Viewport),
    SetScissor(Rect2D),
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    EndPass,
}

/// Recording state of a [`CommandList`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordingState {
    #[default]
    Initial,
    Recording,
    InPass,
    Executable,
}

/// An ordered list of commands with recording-state validation.
#[derive(Debug, Clone, Default)]
pub struct CommandList {
    commands: Vec<Command>,
    state: RecordingState,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin recording. The list must be fresh or reset.
    pub fn begin(&mut self) -> RhiResult<()> {
        self.expect(RecordingState::Initial, "begin")?;
        self.state = RecordingState::Recording;
        Ok(())
    }

    /// Open a render pass on `target`.
    pub fn begin_pass(&mut self, target: u64, extent: Extent2D, clear: [f32; 4]) -> RhiResult<()> {
        self.expect(RecordingState::Recording, "begin_pass")?;
        self.commands.push(Command::BeginPass {
            target,
            extent,
            clear,
        });
        self.state = RecordingState::InPass;
        Ok(())
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> RhiResult<()> {
        self.expect(RecordingState::InPass, "set_viewport")?;
        self.commands.push(Command::SetViewport(viewport));
        Ok(())
    }

    pub fn set_scissor(&mut self, scissor: Rect2D) -> RhiResult<()> {
        self.expect(RecordingState::InPass, "set_scissor")?;
        self.commands.push(Command::SetScissor(scissor));
        Ok(())
    }

    /// Record a non-indexed draw.
    pub fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> RhiResult<()> {
        self.expect(RecordingState::InPass, "draw")?;
        self.commands.push(Command::Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
        Ok(())
    }

    pub fn end_pass(&mut self) -> RhiResult<()> {
        self.expect(RecordingState::InPass, "end_pass")?;
        self.commands.push(Command::EndPass);
        self.state = RecordingState::Recording;
        Ok(())
    }

    /// Finish recording. Fails if a render pass is still open.
    pub fn end(&mut self) -> RhiResult<()> {
        self.expect(RecordingState::Recording, "end")?;
        self.state = RecordingState::Executable;
        Ok(())
    }

    /// Discard all commands and return to the initial state.
    pub fn reset(&mut self) {
        self.commands.clear();
        self.state = RecordingState::Initial;
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_executable(&self) -> bool {
        self.state == RecordingState::Executable
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of draw commands recorded.
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Draw { .. }))
            .count()
    }

    fn expect(&self, state: RecordingState, op: &str) -> RhiResult<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(RhiError::InvalidState(format!(
                "{op} requires {state:?} command list, found {:?}",
                self.state
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent() -> Extent2D {
        Extent2D::new(64, 32)
    }

    #[test]
    fn test_full_recording() {
        let mut list = CommandList::new();
        list.begin().unwrap();
        list.begin_pass(7, extent(), [0.1, 0.2, 0.3, 1.0]).unwrap();
        list.set_viewport(Viewport::full(extent())).unwrap();
        list.set_scissor(Rect2D::full(extent())).unwrap();
        list.draw(3, 1, 0, 0).unwrap();
        list.end_pass().unwrap();
        list.end().unwrap();

        assert!(list.is_executable());
        assert_eq!(list.commands().len(), 5);
        assert_eq!(list.draw_count(), 1);
        assert!(matches!(
            list.commands()[0],
            Command::BeginPass { target: 7, .. }
        ));
        assert_eq!(list.commands()[4], Command::EndPass);
    }

    #[test]
    fn test_draw_outside_pass_rejected() {
        let mut list = CommandList::new();
        list.begin().unwrap();
        assert!(matches!(
            list.draw(3, 1, 0, 0),
            Err(RhiError::InvalidState(_))
        ));
    }

    #[test]
    fn test_end_with_open_pass_rejected() {
        let mut list = CommandList::new();
        list.begin().unwrap();
        list.begin_pass(0, extent(), [0.0; 4]).unwrap();
        assert!(list.end().is_err());
        assert_eq!(list.state(), RecordingState::InPass);
    }

    #[test]
    fn test_double_begin_rejected() {
        let mut list = CommandList::new();
        list.begin().unwrap();
        assert!(list.begin().is_err());
    }

    #[test]
    fn test_reset_allows_reuse() {
        let mut list = CommandList::new();
        list.begin().unwrap();
        list.end().unwrap();
        list.reset();
        assert_eq!(list.state(), RecordingState::Initial);
        assert!(list.commands().is_empty());
        list.begin().unwrap();
    }
}
