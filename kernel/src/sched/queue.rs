//! FIFO ready queue over stable process-table slot indices.
//!
//! PCBs never move once created; the queue only ever links and unlinks
//! slot numbers, matching the "stable handles, not owning pointers" rule
//! the doubly-linked structures in this kernel follow (see `DESIGN.md`).

use super::Scheduler;

/// Append `slot` to the tail of the ready queue.
pub fn enqueue(sched: &mut Scheduler, slot: usize) {
    if let Some(p) = sched.table[slot].as_mut() {
        p.prev = sched.tail;
        p.next = None;
    }
    match sched.tail {
        Some(tail) => {
            if let Some(p) = sched.table[tail].as_mut() {
                p.next = Some(slot);
            }
        }
        None => sched.head = Some(slot),
    }
    sched.tail = Some(slot);
}

/// Remove and return the head of the ready queue, if any.
pub fn dequeue(sched: &mut Scheduler) -> Option<usize> {
    let head = sched.head?;
    let next = sched.table[head].as_ref().and_then(|p| p.next);
    sched.head = next;
    match next {
        Some(n) => {
            if let Some(p) = sched.table[n].as_mut() {
                p.prev = None;
            }
        }
        None => sched.tail = None,
    }
    if let Some(p) = sched.table[head].as_mut() {
        p.prev = None;
        p.next = None;
    }
    Some(head)
}

/// Unlink `slot` from wherever it sits in the queue (used by `process_kill`
/// on a process that may currently be Ready rather than Running).
pub fn remove(sched: &mut Scheduler, slot: usize) {
    let (prev, next) = match sched.table[slot].as_ref() {
        Some(p) => (p.prev, p.next),
        None => return,
    };
    match prev {
        Some(pv) => {
            if let Some(p) = sched.table[pv].as_mut() {
                p.next = next;
            }
        }
        None => sched.head = next,
    }
    match next {
        Some(nx) => {
            if let Some(p) = sched.table[nx].as_mut() {
                p.prev = prev;
            }
        }
        None => sched.tail = prev,
    }
    if let Some(p) = sched.table[slot].as_mut() {
        p.prev = None;
        p.next = None;
    }
}

#[cfg(test)]
mod tests {
    use super::super::process::Pcb;
    use super::*;

    #[test]
    fn fifo_order_preserved() {
        let mut sched = Scheduler::new();
        sched.table[0] = Some(Pcb::new_for_test(1));
        sched.table[1] = Some(Pcb::new_for_test(2));
        sched.table[2] = Some(Pcb::new_for_test(3));
        enqueue(&mut sched, 0);
        enqueue(&mut sched, 1);
        enqueue(&mut sched, 2);

        assert_eq!(dequeue(&mut sched), Some(0));
        assert_eq!(dequeue(&mut sched), Some(1));
        assert_eq!(dequeue(&mut sched), Some(2));
        assert_eq!(dequeue(&mut sched), None);
    }

    #[test]
    fn remove_from_middle_relinks_neighbours() {
        let mut sched = Scheduler::new();
        sched.table[0] = Some(Pcb::new_for_test(1));
        sched.table[1] = Some(Pcb::new_for_test(2));
        sched.table[2] = Some(Pcb::new_for_test(3));
        enqueue(&mut sched, 0);
        enqueue(&mut sched, 1);
        enqueue(&mut sched, 2);

        remove(&mut sched, 1);

        assert_eq!(dequeue(&mut sched), Some(0));
        assert_eq!(dequeue(&mut sched), Some(2));
        assert_eq!(dequeue(&mut sched), None);
    }
}
