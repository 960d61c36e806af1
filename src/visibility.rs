use std::rc::Rc;
use std::time::Duration;

use crate::clock::{Clock, IntervalTimer};
use crate::models::{Bounds, Point};

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Window and pointer operations the overlay host provides.
pub trait WindowHost {
    fn show(&mut self);
    fn hide(&mut self);
    fn is_visible(&self) -> bool;
    fn bounds(&self) -> Bounds;
    fn set_opacity(&mut self, percent: u8);
    fn set_always_on_top(&mut self, on_top: bool);
    fn cursor_position(&self) -> Point;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityState {
    pub pointer_inside: bool,
    pub menu_open: bool,
    pub paused_external: bool,
    pub auto_hide_enabled: bool,
    pub visible: bool,
}

impl Default for VisibilityState {
    fn default() -> Self {
        Self {
            pointer_inside: false,
            menu_open: false,
            paused_external: false,
            auto_hide_enabled: false,
            visible: true,
        }
    }
}

/// Decides when the overlay hides because the pointer left it.
pub struct VisibilityController<H: WindowHost> {
    host: H,
    clock: Rc<dyn Clock>,
    state: VisibilityState,
    poll: IntervalTimer,
    disposed: bool,
}

impl<H: WindowHost> VisibilityController<H> {
    pub fn new(host: H, clock: Rc<dyn Clock>) -> Self {
        Self::with_interval(host, clock, POLL_INTERVAL)
    }

    pub fn with_interval(host: H, clock: Rc<dyn Clock>, interval: Duration) -> Self {
        Self {
            host,
            clock,
            state: VisibilityState::default(),
            poll: IntervalTimer::new(interval),
            disposed: false,
        }
    }

    pub fn state(&self) -> VisibilityState {
        self.state
    }

    pub fn is_visible(&self) -> bool {
        self.state.visible
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_running()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn set_auto_hide_enabled(&mut self, enabled: bool) {
        if self.disposed {
            return;
        }
        self.state.auto_hide_enabled = enabled;
        if enabled {
            if !self.poll.is_running() {
                self.poll.start(self.clock.elapsed());
                log::debug!("auto-hide polling started");
            }
        } else {
            self.poll.cancel();
            if !self.state.visible || !self.host.is_visible() {
                self.host.show();
            }
            self.state.visible = true;
            log::debug!("auto-hide polling stopped");
        }
    }

    pub fn set_menu_open(&mut self, open: bool) {
        self.state.menu_open = open;
    }

    pub fn set_paused_external(&mut self, paused: bool) {
        self.state.paused_external = paused;
    }

    /// Run one poll if it is due. Missed polls collapse into a single tick.
    pub fn advance(&mut self) {
        if self.poll.due_ticks(self.clock.elapsed()) > 0 {
            self.tick();
        }
    }

    /// One poll of pointer position against the window bounds.
    pub fn tick(&mut self) {
        if self.disposed || !self.state.auto_hide_enabled {
            return;
        }

        let point = self.host.cursor_position();
        let bounds = self.host.bounds();
        self.state.pointer_inside = bounds.contains(point);

        if self.state.pointer_inside {
            if !self.state.visible {
                self.state.visible = true;
                self.host.show();
                log::debug!("pointer entered overlay, showing");
            }
        } else if self.state.auto_hide_enabled
            && self.state.visible
            && !self.state.menu_open
            && !self.state.paused_external
        {
            self.state.visible = false;
            self.host.hide();
            log::debug!("pointer left overlay, hiding");
        }
    }

    pub fn show(&mut self) {
        if self.disposed {
            return;
        }
        self.state.visible = true;
        self.host.show();
    }

    pub fn hide(&mut self) {
        if self.disposed {
            return;
        }
        self.state.visible = false;
        self.host.hide();
    }

    pub fn time_until_poll(&self) -> Option<Duration> {
        self.poll.time_until_due(self.clock.elapsed())
    }

    pub fn dispose(&mut self) {
        self.poll.cancel();
        self.disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}
