//! The run controller.
//!
//! Decides *when* the engine's single-step operation is invoked. The
//! controller thread owns the `Cpu` exclusively; external callers hold
//! a command sender and an event receiver, so every mutation of machine
//! state happens on one thread and mode changes arrive as messages.
//!
//! In clocked mode the loop waits on the command channel with the clock
//! interval as timeout: a pending command always wins over the next
//! tick. A zero clock runs at full speed, draining commands between
//! steps.

use crate::cpu::{Cpu, CpuError, Instruction, StepEvent};
use log::{debug, info};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// External intent, delivered to the controller thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Begin or resume execution from the current PC.
    Run,
    /// Stop issuing steps without touching machine state.
    Pause,
    /// Execute exactly one instruction.
    Step,
    /// Zero all machine state.
    Reset,
    /// Force the terminal halted state.
    Halt,
    /// Change the tick interval; zero means full speed.
    SetClock(Duration),
    /// Terminate the controller thread.
    Exit,
}

/// Status broadcast to observers, after the instruction that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// One instruction executed (single-step and clocked modes only).
    Stepped { pc: u16, instr: Instruction },
    /// Execution suspended by a pause command.
    Paused,
    /// The PC ran past the end of the loaded program.
    Completed { cycles: u64 },
    /// A HALT instruction executed, or an external halt command arrived.
    Halted { cycles: u64 },
    /// An unrecoverable fault stopped execution.
    Faulted(String),
    /// A usage error: the command was refused, nothing executed.
    Diagnostic(String),
}

/// Handle to a spawned controller.
pub struct ControllerHandle {
    /// Send commands here.
    pub commands: Sender<Command>,
    /// Status events arrive here.
    pub events: Receiver<Event>,
    thread: JoinHandle<Cpu>,
}

impl ControllerHandle {
    /// Shut the controller down and recover the machine for inspection.
    pub fn join(self) -> Cpu {
        let _ = self.commands.send(Command::Exit);
        self.thread.join().expect("run controller thread panicked")
    }
}

/// Spawn a controller thread owning `cpu`.
pub fn spawn(cpu: Cpu) -> ControllerHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let (evt_tx, evt_rx) = mpsc::channel();
    let thread = thread::spawn(move || {
        Controller {
            cpu,
            clock: Duration::ZERO,
            running: false,
            commands: cmd_rx,
            events: evt_tx,
        }
        .run_loop()
    });
    ControllerHandle {
        commands: cmd_tx,
        events: evt_rx,
        thread,
    }
}

struct Controller {
    cpu: Cpu,
    clock: Duration,
    running: bool,
    commands: Receiver<Command>,
    events: Sender<Event>,
}

impl Controller {
    fn run_loop(mut self) -> Cpu {
        loop {
            let cmd = if self.running {
                if self.clock.is_zero() {
                    match self.commands.try_recv() {
                        Ok(cmd) => Some(cmd),
                        Err(TryRecvError::Empty) => None,
                        Err(TryRecvError::Disconnected) => break,
                    }
                } else {
                    match self.commands.recv_timeout(self.clock) {
                        Ok(cmd) => Some(cmd),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            } else {
                match self.commands.recv() {
                    Ok(cmd) => Some(cmd),
                    Err(_) => break,
                }
            };

            match cmd {
                Some(Command::Run) => self.start(),
                Some(Command::Pause) => self.pause(),
                Some(Command::Step) => self.step_once(),
                Some(Command::Reset) => {
                    self.running = false;
                    self.cpu.reset();
                }
                Some(Command::Halt) => {
                    info!("halt command");
                    self.running = false;
                    self.cpu.halt();
                    self.emit(Event::Halted { cycles: self.cpu.cycles });
                }
                Some(Command::SetClock(clock)) => self.clock = clock,
                Some(Command::Exit) => break,
                None => self.tick(),
            }
        }
        self.cpu
    }

    fn start(&mut self) {
        if !self.cpu.verify_program() {
            self.emit(Event::Diagnostic("no program loaded".into()));
            return;
        }
        if let Err(e) = self.cpu.begin_run() {
            self.emit(Event::Diagnostic(e.to_string()));
            return;
        }
        debug!("run from PC {:04x}", self.cpu.regs.pc);
        self.running = true;
    }

    fn pause(&mut self) {
        if self.running {
            self.running = false;
            self.cpu.pause();
            self.emit(Event::Paused);
        }
    }

    fn step_once(&mut self) {
        self.running = false;
        if !self.cpu.verify_program() {
            self.emit(Event::Diagnostic("no program loaded".into()));
            return;
        }
        if self.cpu.regs.pc >= self.cpu.mem.len() {
            self.emit(Event::Diagnostic(
                "end of memory reached, reset and load a new program".into(),
            ));
            return;
        }
        let pc = self.cpu.regs.pc;
        match self.cpu.step() {
            Ok(StepEvent::Executed(instr)) => {
                self.emit(Event::Stepped { pc, instr });
            }
            Ok(StepEvent::Halted) => {
                self.emit(Event::Halted { cycles: self.cpu.cycles });
            }
            // Stepping a halted or faulted machine is a usage error,
            // not a new fault.
            Err(CpuError::NotRunnable(state)) => {
                self.emit(Event::Diagnostic(format!(
                    "cannot step in state {:?}; reset and reload",
                    state
                )));
            }
            Err(e) => self.emit(Event::Faulted(e.to_string())),
        }
    }

    /// One scheduled execution slot: run-to-completion takes one
    /// instruction per slot at full speed, one per clock tick otherwise.
    fn tick(&mut self) {
        if self.cpu.at_end() {
            self.running = false;
            self.cpu.halt();
            self.emit(Event::Completed { cycles: self.cpu.cycles });
            return;
        }
        let pc = self.cpu.regs.pc;
        match self.cpu.step() {
            Ok(StepEvent::Executed(instr)) => {
                // Per-instruction events only when an observer can keep
                // up; full speed would flood the channel.
                if !self.clock.is_zero() {
                    self.emit(Event::Stepped { pc, instr });
                }
            }
            Ok(StepEvent::Halted) => {
                self.running = false;
                self.emit(Event::Halted { cycles: self.cpu.cycles });
            }
            Err(e) => {
                self.running = false;
                self.emit(Event::Faulted(e.to_string()));
            }
        }
    }

    fn emit(&self, event: Event) {
        // Observers may have gone away; execution does not depend on them.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::MachineConfig;
    use std::time::Duration;

    const SUM_1_TO_10: [u8; 23] = [
        0x00, 0x81, 0xa0, 0x0b, 0x81, 0xa2, 0x01, 0x81, 0xa4, 0xe0,
        0x80, 0xa1, 0x24, 0x81, 0xa0, 0x01, 0x24, 0x81, 0xa4, 0x42,
        0xc1, 0x80, 0xa1,
    ];

    fn wait_for(events: &Receiver<Event>, pred: impl Fn(&Event) -> bool) -> Event {
        loop {
            let event = events
                .recv_timeout(Duration::from_secs(5))
                .expect("no event within timeout");
            if pred(&event) {
                return event;
            }
        }
    }

    #[test]
    fn test_run_to_completion() {
        let mut cpu = Cpu::default();
        cpu.load(&SUM_1_TO_10).unwrap();
        let handle = spawn(cpu);

        handle.commands.send(Command::Run).unwrap();
        let event = wait_for(&handle.events, |e| matches!(e, Event::Completed { .. }));
        assert_eq!(event, Event::Completed { cycles: 122 });

        let cpu = handle.join();
        assert_eq!(cpu.regs.r[0], 55);
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_run_without_program_is_diagnosed() {
        let handle = spawn(Cpu::default());
        handle.commands.send(Command::Run).unwrap();
        let event = handle.events.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event, Event::Diagnostic("no program loaded".into()));

        handle.commands.send(Command::Step).unwrap();
        let event = handle.events.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event, Event::Diagnostic("no program loaded".into()));

        let cpu = handle.join();
        assert_eq!(cpu.cycles, 0);
    }

    #[test]
    fn test_single_step() {
        let mut cpu = Cpu::default();
        cpu.load(&SUM_1_TO_10).unwrap();
        let handle = spawn(cpu);

        handle.commands.send(Command::Step).unwrap();
        let event = handle.events.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(
            event,
            Event::Stepped { pc: 0, instr: Instruction::Set { value: 0 } }
        );

        let cpu = handle.join();
        assert_eq!(cpu.cycles, 1);
        assert_eq!(cpu.regs.pc, 1);
    }

    #[test]
    fn test_pause_preserves_state() {
        // set_1; label_0; goto_0_1 - spins forever
        let mut cpu = Cpu::default();
        cpu.load(&[0x01, 0xe0, 0xc1]).unwrap();
        let handle = spawn(cpu);

        handle.commands.send(Command::SetClock(Duration::from_millis(1))).unwrap();
        handle.commands.send(Command::Run).unwrap();
        // Let at least one clocked step land before pausing.
        wait_for(&handle.events, |e| matches!(e, Event::Stepped { .. }));
        handle.commands.send(Command::Pause).unwrap();
        wait_for(&handle.events, |e| matches!(e, Event::Paused));

        let cpu = handle.join();
        assert_eq!(cpu.state, crate::cpu::CpuState::Paused);
        assert_eq!(cpu.regs.r[0], 1);
    }

    #[test]
    fn test_halt_command_is_terminal() {
        let mut cpu = Cpu::default();
        cpu.load(&SUM_1_TO_10).unwrap();
        let handle = spawn(cpu);

        handle.commands.send(Command::Halt).unwrap();
        wait_for(&handle.events, |e| matches!(e, Event::Halted { .. }));
        handle.commands.send(Command::Run).unwrap();
        let event = handle.events.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(event, Event::Diagnostic(_)));

        let cpu = handle.join();
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_faulting_program_reports_fault() {
        let mut cpu = Cpu::new(MachineConfig { memory_size: 64, stack_size: 4 });
        // pop with an empty stack
        cpu.load(&[0xa1, 0x00]).unwrap();
        let handle = spawn(cpu);

        handle.commands.send(Command::Run).unwrap();
        let event = wait_for(&handle.events, |e| matches!(e, Event::Faulted(_)));
        match event {
            Event::Faulted(reason) => assert!(reason.contains("stack underflow")),
            _ => unreachable!(),
        }

        let cpu = handle.join();
        assert_eq!(cpu.state, crate::cpu::CpuState::Faulted);
    }
}
