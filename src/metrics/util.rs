use prometheus::core::Desc;
use prometheus::proto::{LabelPair, Metric, MetricFamily, MetricType};

pub fn into_labels(kv: &[(&str, &str)]) -> Vec<LabelPair> {
    kv.iter()
        .copied()
        .map(|(k, v)| {
            let mut lp = LabelPair::default();
            lp.set_name(k.to_owned());
            lp.set_value(v.to_owned());
            lp
        })
        .collect()
}

pub fn family(desc: &Desc, field_type: MetricType, metrics: Vec<Metric>) -> MetricFamily {
    let mut mf = MetricFamily::default();
    mf.set_name(desc.fq_name.clone());
    mf.set_help(desc.help.clone());
    mf.set_field_type(field_type);
    mf.set_metric(metrics);
    mf
}

pub fn gauge_metric(label_values: Vec<LabelPair>, value: f64) -> Metric {
    let mut m = Metric::default();
    m.set_label(label_values);

    let mut g = prometheus::proto::Gauge::default();
    g.set_value(value);
    m.set_gauge(g);
    m
}

pub fn gauge(desc: &Desc, label_values: Vec<LabelPair>, value: f64) -> MetricFamily {
    family(desc, MetricType::GAUGE, vec![gauge_metric(label_values, value)])
}

pub fn counter(desc: &Desc, label_values: Vec<LabelPair>, value: f64) -> MetricFamily {
    let mut m = Metric::default();
    m.set_label(label_values);

    let mut c = prometheus::proto::Counter::default();
    c.set_value(value);
    m.set_counter(c);

    family(desc, MetricType::COUNTER, vec![m])
}

pub fn summary(desc: &Desc, label_values: Vec<LabelPair>, count: u64, sum: f64) -> MetricFamily {
    let mut m = Metric::default();
    m.set_label(label_values);

    let mut s = prometheus::proto::Summary::default();
    s.set_sample_count(count);
    s.set_sample_sum(sum);
    m.set_summary(s);

    family(desc, MetricType::SUMMARY, vec![m])
}
