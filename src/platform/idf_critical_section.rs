//! `critical-section` implementation for ESP-IDF.
//!
//! embassy-sync's `CriticalSectionRawMutex` needs one at link time.  Backed
//! by a single process-wide mutex; nesting on the same thread only bumps a
//! depth counter.

use core::cell::{Cell, RefCell};
use std::sync::{Mutex, MutexGuard, PoisonError};

use critical_section::RawRestoreState;

static CRITICAL_SECTION_MUTEX: Mutex<()> = Mutex::new(());

thread_local! {
    static DEPTH: Cell<u8> = const { Cell::new(0) };
    static GUARD: RefCell<Option<MutexGuard<'static, ()>>> = const { RefCell::new(None) };
}

struct IdfCriticalSection;
critical_section::set_impl!(IdfCriticalSection);

// SAFETY: the first acquire on a thread takes the global mutex and the
// matching outermost release drops it, so sections are mutually exclusive
// across threads and re-entrant within one.
unsafe impl critical_section::Impl for IdfCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        DEPTH.with(|depth| {
            let d = depth.get();
            if d == 0 {
                let lock = CRITICAL_SECTION_MUTEX
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                GUARD.with(|guard| *guard.borrow_mut() = Some(lock));
            }
            depth.set(d.saturating_add(1));
        });
    }

    unsafe fn release(_restore: RawRestoreState) {
        DEPTH.with(|depth| {
            let d = depth.get();
            if d == 0 {
                return;
            }
            depth.set(d - 1);
            if d == 1 {
                GUARD.with(|guard| *guard.borrow_mut() = None);
            }
        });
    }
}
