//! CPU tables and interrupt plumbing.

pub mod gdt;
pub mod idt;
pub mod pic;
pub mod pit;
pub mod switch;

use chocola::config::TIMER_HZ;
use chocola::task::ContextTemplate;

/// GDT, IDT, PICs and the PIT. Interrupts are still disabled afterwards.
pub fn init() {
    gdt::init();
    idt::init();
    pic::init();
    pit::init(TIMER_HZ);
}

/// Selectors and exit path every spawned task starts with.
pub fn context_template() -> ContextTemplate {
    let selectors = gdt::selectors();
    ContextTemplate {
        code_selector: selectors.code.0,
        data_selector: selectors.data.0,
        exit_trampoline: switch::task_exit_trampoline as usize,
    }
}
