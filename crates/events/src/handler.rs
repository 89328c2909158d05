/// Execute an aggregate command deterministically (no IO, no async).
///
/// The canonical document lifecycle in one step:
///
/// 1. **Decide**: `aggregate.handle(command)` produces events (pure).
/// 2. **Evolve**: each event is applied via `aggregate.apply(event)`.
///
/// The aggregate maintains its own version tracking during `apply()`
/// (typically +1 per event). Callers that need persistence or publication
/// wrap this in a dispatcher; the function itself has no side effects
/// beyond mutating the aggregate in place.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: payforge_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
