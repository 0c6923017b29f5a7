//! IDT: CPU exceptions, the timer stub and the PS/2 IRQ handlers.

use chocola::println;
use spin::Lazy;
use x86_64::instructions::port::Port;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame, PageFaultErrorCode};
use x86_64::VirtAddr;

use super::gdt;
use super::pic::{end_of_interrupt, InterruptIndex};
use super::switch::timer_entry;
use crate::kernel::{KEYBOARD, MOUSE};

const PS2_DATA_PORT: u16 = 0x60;

static IDT: Lazy<InterruptDescriptorTable> = Lazy::new(|| {
    let mut idt = InterruptDescriptorTable::new();

    // CPU EXCEPTIONS (0-31)
    idt.breakpoint.set_handler_fn(breakpoint_handler);
    idt.page_fault.set_handler_fn(page_fault_handler);
    idt.divide_error.set_handler_fn(divide_error_handler);
    idt.invalid_opcode.set_handler_fn(invalid_opcode_handler);
    idt.general_protection_fault.set_handler_fn(general_protection_fault_handler);
    unsafe {
        idt.double_fault
            .set_handler_fn(double_fault_handler)
            .set_stack_index(gdt::DOUBLE_FAULT_IST_INDEX);
    }

    // HARDWARE INTERRUPTS (32-47 after remapping)
    // The timer stub saves every register itself so it can switch stacks.
    unsafe {
        idt[InterruptIndex::Timer.as_u8()]
            .set_handler_addr(VirtAddr::new(timer_entry as usize as u64));
    }
    idt[InterruptIndex::Keyboard.as_u8()].set_handler_fn(keyboard_interrupt_handler);
    idt[InterruptIndex::Mouse.as_u8()].set_handler_fn(mouse_interrupt_handler);

    idt
});

pub fn init() {
    IDT.load();
}

extern "x86-interrupt" fn breakpoint_handler(frame: InterruptStackFrame) {
    println!("breakpoint at {:#x}", frame.instruction_pointer.as_u64());
}

/// Logs the faulting context and panics; none of these are recoverable.
fn fault(name: &str, frame: &InterruptStackFrame, code: Option<u64>) -> ! {
    println!("CPU exception: {}", name);
    if let Some(code) = code {
        println!("  error code {:#x}", code);
    }
    println!("  rip {:#x}  rsp {:#x}", frame.instruction_pointer.as_u64(), frame.stack_pointer.as_u64());
    panic!("unhandled {}", name);
}

extern "x86-interrupt" fn divide_error_handler(frame: InterruptStackFrame) {
    fault("divide error", &frame, None);
}

extern "x86-interrupt" fn invalid_opcode_handler(frame: InterruptStackFrame) {
    fault("invalid opcode", &frame, None);
}

extern "x86-interrupt" fn general_protection_fault_handler(frame: InterruptStackFrame, code: u64) {
    fault("general protection fault", &frame, Some(code));
}

extern "x86-interrupt" fn double_fault_handler(frame: InterruptStackFrame, code: u64) -> ! {
    fault("double fault", &frame, Some(code))
}

extern "x86-interrupt" fn page_fault_handler(frame: InterruptStackFrame, code: PageFaultErrorCode) {
    use x86_64::registers::control::Cr2;

    println!("  faulting address {:?} ({:?})", Cr2::read(), code);
    fault("page fault", &frame, Some(code.bits()));
}

extern "x86-interrupt" fn keyboard_interrupt_handler(_stack_frame: InterruptStackFrame) {
    let scancode: u8 = unsafe { Port::new(PS2_DATA_PORT).read() };
    KEYBOARD.on_scancode(scancode);
    unsafe { end_of_interrupt(InterruptIndex::Keyboard) };
}

extern "x86-interrupt" fn mouse_interrupt_handler(_stack_frame: InterruptStackFrame) {
    let byte: u8 = unsafe { Port::new(PS2_DATA_PORT).read() };
    MOUSE.on_byte(byte);
    unsafe { end_of_interrupt(InterruptIndex::Mouse) };
}
