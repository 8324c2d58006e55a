//! Clock, timer and market data nodes.

use chrono::{Duration, NaiveDateTime, NaiveTime};

use super::functions::Arguments;
use super::Translator;
use crate::domain::error::{CompileError, Fault};
use crate::domain::market::{BboQuote, MarketQuery, OrderImbalance, TimeAndSale};
use crate::domain::node::{Node, NodeKind};
use crate::domain::reactor::{
    chain, constant, lift, lift2, queue, queue_series, switch, throw, Series, Trigger,
};
use crate::domain::translation::Translation;
use crate::domain::value::{Quantity, Record, Security, Side, Venue};
use crate::ports::timer_port::{TimerFactory, TimerMode};

fn start_timer(
    timers: &dyn TimerFactory,
    trigger: &Trigger,
    interval: Duration,
    mode: TimerMode,
) -> Series<Quantity> {
    let (sink, reactor) = queue::<Quantity>(trigger);
    let guard = timers.start(interval, mode, sink);
    Series::new(reactor.with_guard(guard))
}

fn unsupported(service: &str) -> Translation {
    Translation::new(throw::<Record>(Fault::Unsupported(service.to_string())))
}

impl<'a> Translator<'a, '_> {
    pub(super) fn current_time(&self, kind: &NodeKind) -> Translation {
        let time = self.context.time();
        let once = constant(());
        match kind {
            NodeKind::CurrentDate => Translation::new(lift(
                move |_: ()| Ok(time.now().date().and_time(NaiveTime::MIN)),
                once,
            )),
            NodeKind::CurrentTime => Translation::new(lift(
                move |_: ()| Ok(time.now().time().signed_duration_since(NaiveTime::MIN)),
                once,
            )),
            _ => Translation::new(lift(move |_: ()| Ok(time.now()), once)),
        }
    }

    /// Ticks 1, 2, 3.. every period. A new period restarts the count.
    pub(super) fn timer(&mut self, node: &'a Node) -> Result<Translation, CompileError> {
        let (_, translations) = self.resolve(node)?;
        let period = Arguments {
            kind: node.kind(),
            translations: &translations,
        }
        .get::<Duration>(0)?;
        let Some(timers) = self.context.timers() else {
            return Ok(Translation::new(throw::<Quantity>(Fault::Unsupported(
                "timers".into(),
            ))));
        };
        let trigger = self.context.trigger().clone();
        let ticks = lift(
            move |period: Duration| {
                Ok(start_timer(&*timers, &trigger, period, TimerMode::Periodic))
            },
            period,
        );
        Ok(Translation::new(switch(ticks)))
    }

    /// False until the expiry, then true. An expiry in the past is true at
    /// once.
    pub(super) fn alarm(&mut self, node: &'a Node) -> Result<Translation, CompileError> {
        let (_, translations) = self.resolve(node)?;
        let expiry = Arguments {
            kind: node.kind(),
            translations: &translations,
        }
        .get::<NaiveDateTime>(0)?;
        let time = self.context.time();
        let timers = self.context.timers();
        let trigger = self.context.trigger().clone();
        let alarms = lift(
            move |expiry: NaiveDateTime| {
                let remaining = expiry.signed_duration_since(time.now());
                if remaining <= Duration::zero() {
                    return Ok(constant(true));
                }
                let timers = timers
                    .as_ref()
                    .ok_or_else(|| Fault::Unsupported("timers".into()))?;
                let fired = lift(
                    |_: Quantity| Ok(true),
                    start_timer(&**timers, &trigger, remaining, TimerMode::OneShot),
                );
                Ok(chain(constant(false), fired, &trigger))
            },
            expiry,
        );
        Ok(Translation::new(switch(alarms)))
    }

    pub(super) fn time_and_sales(&mut self, node: &'a Node) -> Result<Translation, CompileError> {
        let (_, translations) = self.resolve(node)?;
        let securities = Arguments {
            kind: node.kind(),
            translations: &translations,
        }
        .get::<Security>(0)?;
        let Some(client) = self.context.market_data() else {
            return Ok(unsupported("market data"));
        };
        let time = self.context.time();
        let trigger = self.context.trigger().clone();
        let streams = lift(
            move |security: Security| {
                let (sink, sales) = queue_series::<TimeAndSale>(&trigger);
                client.query_time_and_sales(MarketQuery::real_time(security, time.now()), sink);
                Ok(lift(|sale: TimeAndSale| Ok(sale.to_record()), sales))
            },
            securities,
        );
        Ok(Translation::new(switch(streams)))
    }

    pub(super) fn bbo_quotes(&mut self, node: &'a Node) -> Result<Translation, CompileError> {
        let (_, translations) = self.resolve(node)?;
        let arguments = Arguments {
            kind: node.kind(),
            translations: &translations,
        };
        let (securities, sides) = (arguments.get::<Security>(0)?, arguments.get::<Side>(1)?);
        let Some(client) = self.context.market_data() else {
            return Ok(unsupported("market data"));
        };
        let time = self.context.time();
        let trigger = self.context.trigger().clone();
        let streams = lift2(
            move |security: Security, side: Side| {
                let (sink, quotes) = queue_series::<BboQuote>(&trigger);
                client.query_bbo_quotes(MarketQuery::real_time(security, time.now()), sink);
                Ok(lift(move |quote: BboQuote| Ok(quote.side_record(side)), quotes))
            },
            securities,
            sides,
        );
        Ok(Translation::new(switch(streams)))
    }

    pub(super) fn order_imbalances(
        &mut self,
        node: &'a Node,
    ) -> Result<Translation, CompileError> {
        let (_, translations) = self.resolve(node)?;
        let venues = Arguments {
            kind: node.kind(),
            translations: &translations,
        }
        .get::<Venue>(0)?;
        let Some(client) = self.context.market_data() else {
            return Ok(unsupported("market data"));
        };
        let time = self.context.time();
        let trigger = self.context.trigger().clone();
        let streams = lift(
            move |venue: Venue| {
                let (sink, imbalances) = queue_series::<OrderImbalance>(&trigger);
                client.query_order_imbalances(MarketQuery::real_time(venue, time.now()), sink);
                Ok(lift(
                    |imbalance: OrderImbalance| Ok(imbalance.to_record()),
                    imbalances,
                ))
            },
            venues,
        );
        Ok(Translation::new(switch(streams)))
    }
}
