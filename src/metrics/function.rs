//! Meters whose value is computed from a shared source every time the registry
//! is gathered. Nothing is cached between scrapes.

use crate::metrics::util::{counter, gauge, summary};
use prometheus::Registry;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use std::collections::HashMap;
use std::sync::Arc;

type Accessor<T> = Box<dyn Fn(&T) -> f64 + Send + Sync>;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Unit {
    None,
    Milliseconds,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MeterKind {
    Gauge,
    Counter,
    Timer,
}

/// Registry-agnostic identity of a meter, e.g. `undertow.request.time.max`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MeterId {
    pub name: &'static str,
    pub description: &'static str,
    pub unit: Unit,
}

impl MeterId {
    pub const fn new(name: &'static str, description: &'static str, unit: Unit) -> Self {
        Self {
            name,
            description,
            unit,
        }
    }

    pub fn prometheus_name(&self, kind: MeterKind) -> String {
        let mut name = self.name.replace(['.', '-'], "_");

        if self.unit == Unit::Milliseconds {
            name.push_str("_milliseconds");
        }

        if kind == MeterKind::Counter {
            name.push_str("_total");
        }

        name
    }

    pub fn desc(&self, kind: MeterKind, variable_labels: &[&str]) -> anyhow::Result<Desc> {
        let desc = Desc::new(
            self.prometheus_name(kind),
            self.description.to_owned(),
            variable_labels.iter().map(|l| (*l).to_owned()).collect(),
            HashMap::new(),
        )?;

        Ok(desc)
    }
}

pub struct FunctionGauge<T> {
    desc: Desc,
    source: Arc<T>,
    value: Accessor<T>,
}

impl<T> FunctionGauge<T>
where
    T: Send + Sync + 'static,
{
    pub fn new<F>(id: &MeterId, source: Arc<T>, value: F) -> anyhow::Result<Self>
    where
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        Ok(Self {
            desc: id.desc(MeterKind::Gauge, &[])?,
            source,
            value: Box::new(value),
        })
    }

    pub fn register(self, registry: &Registry) -> anyhow::Result<()> {
        registry.register(Box::new(self))?;
        Ok(())
    }
}

impl<T> Collector for FunctionGauge<T>
where
    T: Send + Sync + 'static,
{
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        vec![gauge(&self.desc, vec![], (self.value)(&self.source))]
    }
}

pub struct FunctionCounter<T> {
    desc: Desc,
    source: Arc<T>,
    value: Accessor<T>,
}

impl<T> FunctionCounter<T>
where
    T: Send + Sync + 'static,
{
    pub fn new<F>(id: &MeterId, source: Arc<T>, value: F) -> anyhow::Result<Self>
    where
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        Ok(Self {
            desc: id.desc(MeterKind::Counter, &[])?,
            source,
            value: Box::new(value),
        })
    }

    pub fn register(self, registry: &Registry) -> anyhow::Result<()> {
        registry.register(Box::new(self))?;
        Ok(())
    }
}

impl<T> Collector for FunctionCounter<T>
where
    T: Send + Sync + 'static,
{
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        vec![counter(&self.desc, vec![], (self.value)(&self.source))]
    }
}

/// A timer built from a cumulative count and a total time, exposed as a
/// summary without quantiles.
pub struct FunctionTimer<T> {
    desc: Desc,
    source: Arc<T>,
    count: Box<dyn Fn(&T) -> u64 + Send + Sync>,
    total_time: Accessor<T>,
}

impl<T> FunctionTimer<T>
where
    T: Send + Sync + 'static,
{
    pub fn new<C, F>(id: &MeterId, source: Arc<T>, count: C, total_time: F) -> anyhow::Result<Self>
    where
        C: Fn(&T) -> u64 + Send + Sync + 'static,
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        Ok(Self {
            desc: id.desc(MeterKind::Timer, &[])?,
            source,
            count: Box::new(count),
            total_time: Box::new(total_time),
        })
    }

    pub fn register(self, registry: &Registry) -> anyhow::Result<()> {
        registry.register(Box::new(self))?;
        Ok(())
    }
}

impl<T> Collector for FunctionTimer<T>
where
    T: Send + Sync + 'static,
{
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let count = (self.count)(&self.source);
        let total_time = (self.total_time)(&self.source);
        vec![summary(&self.desc, vec![], count, total_time)]
    }
}
