//! Multi-round-trip session logic as sans-IO state machines.
//!
//! An [`Operation`] hands its driver one query at a time and is resumed
//! with the outcome of each exchange until it is [`Step::Done`]. Retries,
//! follow-up requests and early exits all live here, so a connection only
//! moves bytes:
//!
//! ```text
//! step = op.start(state)
//! while step is Send(query):
//!     step = op.resume(state, exchange(query))
//! ```
use crate::{
    error::{IrbisError, Result},
    protocol::{Query, Response},
};

use super::{SessionState, commands::Command};

/// What an operation wants next.
#[derive(Debug)]
pub enum Step<T> {
    /// Exchange this query and resume with the answer.
    Send(Query),
    Done(T),
}

pub trait Operation {
    type Output;

    /// First step. Errors here happen before any I/O.
    fn start(&mut self, state: &mut SessionState) -> Result<Step<Self::Output>>;

    /// Continue with the outcome of exchanging the last query sent.
    fn resume(&mut self, state: &mut SessionState, answer: Result<Response>) -> Result<Step<Self::Output>>;

    /// Transform the final output.
    fn map<U, F>(self, map: F) -> Map<Self, F>
    where
        Self: Sized,
        F: FnOnce(Self::Output) -> Result<U>,
    {
        Map {
            operation: self,
            map: Some(map),
        }
    }

    /// Continue with the operation `next` builds from the output.
    fn then<B, F>(self, next: F) -> Then<Self, F, B>
    where
        Self: Sized,
        B: Operation,
        F: FnOnce(&mut SessionState, Self::Output) -> Result<B>,
    {
        Then {
            first: self,
            next: Some(next),
            second: None,
        }
    }
}

fn finished() -> IrbisError {
    IrbisError::validation("operation resumed after it finished")
}

impl<O: Operation + ?Sized> Operation for Box<O> {
    type Output = O::Output;

    fn start(&mut self, state: &mut SessionState) -> Result<Step<O::Output>> {
        (**self).start(state)
    }

    fn resume(&mut self, state: &mut SessionState, answer: Result<Response>) -> Result<Step<O::Output>> {
        (**self).resume(state, answer)
    }
}

/// One command, one round trip.
#[derive(Debug)]
pub struct Single<C> {
    command: Option<C>,
}

pub fn single<C: Command>(command: C) -> Single<C> {
    Single { command: Some(command) }
}

impl<C: Command> Operation for Single<C> {
    type Output = C::Output;

    fn start(&mut self, state: &mut SessionState) -> Result<Step<C::Output>> {
        let command = self.command.as_ref().ok_or_else(finished)?;
        Ok(Step::Send(command.build(state)?))
    }

    fn resume(&mut self, state: &mut SessionState, answer: Result<Response>) -> Result<Step<C::Output>> {
        let command = self.command.take().ok_or_else(finished)?;
        Ok(Step::Done(command.decode(state, answer?)?))
    }
}

/// Finishes without talking to the server.
#[derive(Debug)]
pub struct Ready<T>(Option<T>);

pub fn ready<T>(value: T) -> Ready<T> {
    Ready(Some(value))
}

impl<T> Operation for Ready<T> {
    type Output = T;

    fn start(&mut self, _state: &mut SessionState) -> Result<Step<T>> {
        self.0.take().map(Step::Done).ok_or_else(finished)
    }

    fn resume(&mut self, _state: &mut SessionState, _answer: Result<Response>) -> Result<Step<T>> {
        Err(finished())
    }
}

/// Operation chosen from the session state when it starts.
pub struct Plan<F, O> {
    plan: Option<F>,
    operation: Option<O>,
}

pub fn plan<F, O>(plan: F) -> Plan<F, O>
where
    F: FnOnce(&SessionState) -> Result<O>,
    O: Operation,
{
    Plan {
        plan: Some(plan),
        operation: None,
    }
}

impl<F, O> Operation for Plan<F, O>
where
    F: FnOnce(&SessionState) -> Result<O>,
    O: Operation,
{
    type Output = O::Output;

    fn start(&mut self, state: &mut SessionState) -> Result<Step<O::Output>> {
        let plan = self.plan.take().ok_or_else(finished)?;
        let operation = self.operation.insert(plan(state)?);
        operation.start(state)
    }

    fn resume(&mut self, state: &mut SessionState, answer: Result<Response>) -> Result<Step<O::Output>> {
        self.operation.as_mut().ok_or_else(finished)?.resume(state, answer)
    }
}

pub struct Map<O, F> {
    operation: O,
    map: Option<F>,
}

impl<O, F, U> Map<O, F>
where
    O: Operation,
    F: FnOnce(O::Output) -> Result<U>,
{
    fn advance(&mut self, step: Step<O::Output>) -> Result<Step<U>> {
        match step {
            Step::Send(query) => Ok(Step::Send(query)),
            Step::Done(output) => {
                let map = self.map.take().ok_or_else(finished)?;
                Ok(Step::Done(map(output)?))
            }
        }
    }
}

impl<O, F, U> Operation for Map<O, F>
where
    O: Operation,
    F: FnOnce(O::Output) -> Result<U>,
{
    type Output = U;

    fn start(&mut self, state: &mut SessionState) -> Result<Step<U>> {
        let step = self.operation.start(state)?;
        self.advance(step)
    }

    fn resume(&mut self, state: &mut SessionState, answer: Result<Response>) -> Result<Step<U>> {
        let step = self.operation.resume(state, answer)?;
        self.advance(step)
    }
}

pub struct Then<A, F, B> {
    first: A,
    next: Option<F>,
    second: Option<B>,
}

impl<A, F, B> Then<A, F, B>
where
    A: Operation,
    B: Operation,
    F: FnOnce(&mut SessionState, A::Output) -> Result<B>,
{
    fn advance(&mut self, state: &mut SessionState, step: Step<A::Output>) -> Result<Step<B::Output>> {
        match step {
            Step::Send(query) => Ok(Step::Send(query)),
            Step::Done(output) => {
                let next = self.next.take().ok_or_else(finished)?;
                let second = self.second.insert(next(state, output)?);
                second.start(state)
            }
        }
    }
}

impl<A, F, B> Operation for Then<A, F, B>
where
    A: Operation,
    B: Operation,
    F: FnOnce(&mut SessionState, A::Output) -> Result<B>,
{
    type Output = B::Output;

    fn start(&mut self, state: &mut SessionState) -> Result<Step<B::Output>> {
        let step = self.first.start(state)?;
        self.advance(state, step)
    }

    fn resume(&mut self, state: &mut SessionState, answer: Result<Response>) -> Result<Step<B::Output>> {
        if let Some(second) = self.second.as_mut() {
            return second.resume(state, answer);
        }
        let step = self.first.resume(state, answer)?;
        self.advance(state, step)
    }
}

/// One of two operations with the same output.
#[derive(Debug)]
pub enum Either<L, R> {
    Left(L),
    Right(R),
}

impl<L, R> Operation for Either<L, R>
where
    L: Operation,
    R: Operation<Output = L::Output>,
{
    type Output = L::Output;

    fn start(&mut self, state: &mut SessionState) -> Result<Step<L::Output>> {
        match self {
            Either::Left(left) => left.start(state),
            Either::Right(right) => right.start(state),
        }
    }

    fn resume(&mut self, state: &mut SessionState, answer: Result<Response>) -> Result<Step<L::Output>> {
        match self {
            Either::Left(left) => left.resume(state, answer),
            Either::Right(right) => right.resume(state, answer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        protocol::{command, testing::answer},
        session::commands::Simple,
        settings::ConnectionSettings,
    };

    fn state() -> SessionState {
        SessionState::new(ConnectionSettings::new("librarian", "secret"))
    }

    fn reply(lines: &[&str]) -> Result<Response> {
        Response::new(answer("X", lines))
    }

    #[test]
    fn ready_sends_nothing() {
        let mut state = state();
        assert!(matches!(ready(5).start(&mut state), Ok(Step::Done(5))));
        assert_eq!(state.query_id(), 0);
    }

    #[test]
    fn single_round_trip() {
        let mut state = state();
        let mut nop = single(Simple::new(command::NOP));

        assert!(matches!(nop.start(&mut state), Ok(Step::Send(_))));
        assert!(matches!(nop.resume(&mut state, reply(&["0"])), Ok(Step::Done(0))));
        assert!(nop.resume(&mut state, reply(&["0"])).is_err());
    }

    #[test]
    fn transport_failure_reaches_the_operation() {
        let mut state = state();
        let mut nop = single(Simple::new(command::NOP));
        nop.start(&mut state).unwrap();

        let failed = Err(IrbisError::validation("no route"));
        assert!(matches!(nop.resume(&mut state, failed), Err(IrbisError::Validation(_))));
    }

    #[test]
    fn then_chains_round_trips_and_map_shapes_output() {
        let mut state = state();
        let mut chained = single(Simple::new(command::GET_MAX_MFN).line("IBIS"))
            .then(|_, max_mfn| Ok(single(Simple::new(command::UNLOCK_RECORDS).line("IBIS").line(max_mfn))))
            .map(|code| Ok(code == 0));

        let Ok(Step::Send(first)) = chained.start(&mut state) else {
            panic!("expected a query");
        };
        assert_eq!(first.command(), "O");

        let Ok(Step::Send(second)) = chained.resume(&mut state, reply(&["12"])) else {
            panic!("expected a second query");
        };
        assert_eq!(second.command(), "Q");
        assert!(matches!(chained.resume(&mut state, reply(&["0"])), Ok(Step::Done(true))));
    }

    #[test]
    fn plan_reads_session_state() {
        let mut state = state();
        state.set_database("RDR");
        let mut planned = plan(|state: &SessionState| {
            Ok(match state.database() {
                "RDR" => Either::Left(ready(1)),
                _ => Either::Right(ready(2)),
            })
        });
        assert!(matches!(planned.start(&mut state), Ok(Step::Done(1))));
    }
}
