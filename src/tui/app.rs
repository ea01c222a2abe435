//! Dashboard application state and logic.

use crate::asm::disasm;
use crate::cpu::{Cpu, MachineConfig, StepEvent};
use std::time::Duration;

/// Dashboard application state.
pub struct DashboardApp {
    /// The machine being driven.
    pub cpu: Cpu,
    /// Original program, for reload.
    pub program: Vec<u8>,
    /// Is the machine running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset (rows of 16 bytes).
    pub mem_scroll: usize,
    /// Delay between instructions while running; zero is full speed.
    pub clock: Duration,
}

impl DashboardApp {
    /// Create a dashboard with a loaded program.
    pub fn new(program: Vec<u8>, config: MachineConfig) -> Self {
        let mut cpu = Cpu::new(config);
        let status = match cpu.load(&program) {
            Ok(()) => "Ready. 'r' run, 's' step, 'p' pause, 'x' reset, 'q' quit.".into(),
            Err(e) => format!("Load failed: {}", e),
        };
        Self {
            cpu,
            program,
            running: false,
            should_quit: false,
            status,
            mem_scroll: 0,
            clock: Duration::ZERO,
        }
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if !self.cpu.verify_program() {
            self.status = "No program loaded.".into();
            self.running = false;
            return;
        }
        if self.cpu.at_end() {
            self.status = format!(
                "End of program, PC = {:04x}. Reset to run again.",
                self.cpu.regs.pc
            );
            self.running = false;
            return;
        }
        let pc = self.cpu.regs.pc;
        match self.cpu.step() {
            Ok(StepEvent::Executed(_)) => {
                let (text, _) = disasm::disassemble_instruction(self.cpu.mem.bytes(), pc);
                self.status = format!(
                    "PC={:04x}: {}  R0={:04x} SP={:04x}",
                    pc, text, self.cpu.regs.r[0], self.cpu.regs.sp
                );
            }
            Ok(StepEvent::Halted) => {
                self.status = format!("Halted after {} cycles.", self.cpu.cycles);
                self.running = false;
            }
            Err(e) => {
                self.status = format!("Fault: {}", e);
                self.running = false;
            }
        }
    }

    /// Begin continuous execution.
    pub fn run(&mut self) {
        if !self.cpu.verify_program() {
            self.status = "No program loaded.".into();
            return;
        }
        if self.cpu.begin_run().is_err() {
            self.status = format!("Cannot run from state {:?}. Reset first.", self.cpu.state);
            return;
        }
        self.running = true;
        self.status = "Running...".into();
    }

    /// One iteration of continuous execution. A non-zero clock paces
    /// one instruction per tick; full speed takes a burst per frame so
    /// the display stays responsive.
    pub fn tick(&mut self) {
        let burst = if self.clock.is_zero() { 128 } else { 1 };
        for _ in 0..burst {
            if !self.running {
                return;
            }
            if self.cpu.at_end() {
                self.cpu.halt();
                self.running = false;
                self.status = format!("Completed after {} cycles.", self.cpu.cycles);
                return;
            }
            self.step();
        }
    }

    /// Suspend continuous execution, preserving all machine state.
    pub fn pause(&mut self) {
        self.running = false;
        self.cpu.pause();
        self.status = "Paused. 'r' or 's' to continue.".into();
    }

    /// Reset and reload the program.
    pub fn reset(&mut self) {
        self.running = false;
        self.status = match self.cpu.load(&self.program) {
            Ok(()) => "Reset. Ready.".into(),
            Err(e) => format!("Load failed: {}", e),
        };
    }

    /// Slow the clock down one notch.
    pub fn slower(&mut self) {
        self.clock = (self.clock + Duration::from_millis(50)).min(Duration::from_secs(2));
        self.status = format!("Clock delay {} ms.", self.clock.as_millis());
    }

    /// Speed the clock up one notch.
    pub fn faster(&mut self) {
        self.clock = self.clock.saturating_sub(Duration::from_millis(50));
        self.status = format!("Clock delay {} ms.", self.clock.as_millis());
    }

    /// Code listing rows around the current PC: (addr, text, is_current).
    pub fn code_listing(&self, lines: usize) -> Vec<(u16, String, bool)> {
        let code = &self.cpu.mem.bytes()[..self.cpu.code_len() as usize];
        let rows = disasm::listing(code);
        let current = rows
            .iter()
            .position(|(addr, _)| *addr == self.cpu.regs.pc)
            .unwrap_or(rows.len());
        let start = current.saturating_sub(lines / 2);
        rows.into_iter()
            .skip(start)
            .take(lines)
            .map(|(addr, text)| (addr, text, addr == self.cpu.regs.pc))
            .collect()
    }
}

/// Run the dashboard over a program.
pub fn run_dashboard(program: Vec<u8>, config: MachineConfig) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DashboardApp::new(program, config);

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        let poll_wait = if app.running && !app.clock.is_zero() {
            app.clock
        } else {
            Duration::from_millis(50)
        };
        if event::poll(poll_wait)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => app.pause(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Char('+') => app.slower(),
                        KeyCode::Char('-') => app.faster(),
                        KeyCode::Up => {
                            app.mem_scroll = app.mem_scroll.saturating_sub(1);
                        }
                        KeyCode::Down => {
                            let rows = (app.cpu.mem.len() as usize).div_ceil(16);
                            if app.mem_scroll + 1 < rows {
                                app.mem_scroll += 1;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUM_1_TO_10: [u8; 23] = [
        0x00, 0x81, 0xa0, 0x0b, 0x81, 0xa2, 0x01, 0x81, 0xa4, 0xe0,
        0x80, 0xa1, 0x24, 0x81, 0xa0, 0x01, 0x24, 0x81, 0xa4, 0x42,
        0xc1, 0x80, 0xa1,
    ];

    #[test]
    fn test_run_ticks_to_completion() {
        let mut app = DashboardApp::new(SUM_1_TO_10.to_vec(), MachineConfig::default());
        app.run();
        while app.running {
            app.tick();
        }
        assert_eq!(app.cpu.regs.r[0], 55);
        assert!(app.status.starts_with("Completed"));
    }

    #[test]
    fn test_step_then_reset() {
        let mut app = DashboardApp::new(SUM_1_TO_10.to_vec(), MachineConfig::default());
        app.step();
        assert_eq!(app.cpu.cycles, 1);
        app.reset();
        assert_eq!(app.cpu.cycles, 0);
        assert_eq!(app.cpu.regs.pc, 0);
    }

    #[test]
    fn test_code_listing_marks_pc() {
        let mut app = DashboardApp::new(SUM_1_TO_10.to_vec(), MachineConfig::default());
        app.step();
        let rows = app.code_listing(8);
        let current: Vec<_> = rows.iter().filter(|(_, _, cur)| *cur).collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].0, 1);
    }
}
