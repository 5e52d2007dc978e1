//! Wires the CPU to memory, the I/O fabric, and the two peripherals, and
//! drives the frame loop: `execute` the CPU, `tick` the disk, `draw` the
//! display.

use std::cell::RefCell;
use std::rc::Rc;

use crate::cpu::Cpu;
use crate::disk::{self, Disk};
use crate::display::{self, Display};
use crate::io::IoFabric;
use crate::memory::Memory;

pub struct Machine {
    cpu: Cpu,
    mem: Rc<RefCell<Memory>>,
    disk: Rc<RefCell<Disk>>,
    display: Rc<RefCell<Display>>,
}

impl Machine {
    pub fn new() -> Self {
        let mem = Rc::new(RefCell::new(Memory::new()));
        let io = Rc::new(RefCell::new(IoFabric::new()));
        let disk = Rc::new(RefCell::new(Disk::new()));
        let display = Rc::new(RefCell::new(Display::new()));

        {
            let mut fabric = io.borrow_mut();
            bind_ports(
                &mut fabric,
                &[
                    disk::PORT_COMMAND,
                    disk::PORT_DATA_LO,
                    disk::PORT_DATA_HI,
                    disk::PORT_STATUS,
                ],
                &disk,
            );
            bind_ports(
                &mut fabric,
                &[
                    display::PORT_COMMAND,
                    display::PORT_DATA_LO,
                    display::PORT_DATA_HI,
                ],
                &display,
            );
        }

        let cpu = Cpu::new(mem.clone(), io);
        Machine {
            cpu,
            mem,
            disk,
            display,
        }
    }

    pub fn load_program(&mut self, program: &[u8]) {
        self.mem.borrow_mut().load(program);
    }

    pub fn load_disk_image(&mut self, image: &[u8]) {
        self.disk.borrow_mut().load_image(image);
    }

    pub fn is_halted(&self) -> bool {
        self.cpu.is_halted()
    }

    pub fn reg_a(&self) -> u16 {
        self.cpu.regs.a
    }

    pub fn reg_b(&self) -> u16 {
        self.cpu.regs.b
    }

    pub fn reg_s(&self) -> u16 {
        self.cpu.regs.s
    }

    pub fn reg_i(&self) -> u16 {
        self.cpu.regs.i
    }

    pub fn peek_byte(&self, addr: u16) -> u8 {
        self.mem.borrow().get_byte(addr)
    }

    pub fn peek_short(&self, addr: u16) -> u16 {
        self.mem.borrow().get_short(addr)
    }

    /// Fetches and executes one instruction.
    pub fn step(&mut self) {
        self.cpu.execute();
    }

    /// Advances the disk's in-flight transfer, if any, by one byte.
    pub fn tick_disk(&mut self) {
        let mut mem = self.mem.borrow_mut();
        self.disk.borrow_mut().tick(&mut mem);
    }

    /// A one-line register/flag dump for the `--debug` terminal view.
    pub fn debug_state(&self) -> String {
        use termion::color::{Fg, Reset, Yellow};
        let r = &self.cpu.regs;
        let f = &self.cpu.flags;
        format!(
            "{}A={:04X} B={:04X} S={:04X} I={:04X}{} Z={} C={} S={} V={} H={} E={}",
            Fg(Yellow),
            r.a,
            r.b,
            r.s,
            r.i,
            Fg(Reset),
            f.z as u8,
            f.c as u8,
            f.s as u8,
            f.v as u8,
            f.h as u8,
            f.e as u8,
        )
    }

    /// Renders the display's current mode into `frame`, a
    /// `display::FRAME_WIDTH * display::FRAME_HEIGHT` ARGB buffer.
    pub fn draw(&self, frame: &mut [u32]) {
        let mem = self.mem.borrow();
        self.display.borrow().draw(&mem, frame);
    }

    /// Runs one frame: one CPU step, one disk tick, one render. The host's
    /// frame loop calls this in a loop until `is_halted()`.
    pub fn frame(&mut self, frame_buf: &mut [u32]) {
        self.step();
        self.tick_disk();
        self.draw(frame_buf);
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

fn bind_ports<T: 'static>(fabric: &mut IoFabric, ports: &[u8], peripheral: &Rc<RefCell<T>>)
where
    T: PortDevice,
{
    for &port in ports {
        let reader = peripheral.clone();
        fabric.register_read(port, Box::new(move || reader.borrow_mut().read_port(port)));
        let writer = peripheral.clone();
        fabric.register_write(
            port,
            Box::new(move |value| writer.borrow_mut().write_port(port, value)),
        );
    }
}

trait PortDevice {
    fn read_port(&mut self, port: u8) -> u8;
    fn write_port(&mut self, port: u8, value: u8);
}

impl PortDevice for Disk {
    fn read_port(&mut self, port: u8) -> u8 {
        Disk::read_port(self, port)
    }
    fn write_port(&mut self, port: u8, value: u8) {
        Disk::write_port(self, port, value)
    }
}

impl PortDevice for Display {
    fn read_port(&mut self, port: u8) -> u8 {
        Display::read_port(self, port)
    }
    fn write_port(&mut self, port: u8, value: u8) {
        Display::write_port(self, port, value)
    }
}
