//! Interactive demo driven entirely in memory: a greeting that re-renders
//! with new props and a click counter backed by `use_state`.

use std::sync::Arc;
use std::time::Duration;

use fibra_core::{
    deps, use_effect, use_state, Element, Event, MemoryHost, Props, Renderer, Runtime,
};
use fibra_runtime_std::{run_until_idle, SignalScheduler};

const SLICE: Duration = Duration::from_millis(4);

fn greeting(props: &Props) -> Element {
    let name = props.text("name").unwrap_or("world").to_owned();
    Element::host("h2")
        .style([("textAlign", "center")])
        .child(format!("Hello, {name}!"))
}

fn counter(_props: &Props) -> Element {
    let (count, set) = use_state(1i64);
    use_effect(move || log::info!("count is now {count}"), deps![count]);
    Element::host("h1")
        .on("click", move |_| set.set(|n| n + 1))
        .child(format!("Count: {count}"))
}

fn app(name: &str) -> Element {
    Element::host("div")
        .attr("id", "app")
        .child(Element::component(greeting).attr("name", name))
        .child(Element::component(counter))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let scheduler = Arc::new(SignalScheduler::new());
    let runtime = Runtime::new(scheduler.clone());
    let mut renderer = Renderer::with_runtime(MemoryHost::new(), runtime);
    let container = renderer.host_mut().create_root();

    renderer.render(app("world"), container);
    run_until_idle(&mut renderer, SLICE)?;
    println!("After the first render:");
    println!("{}", renderer.host().dump_tree(container));

    // Click the counter heading twice; both updates fold into one pass.
    let root = renderer.host().node(container)?.children()[0];
    let heading = renderer.host().node(root)?.children()[1];
    renderer.host().dispatch(heading, &Event::new("click"))?;
    renderer.host().dispatch(heading, &Event::new("click"))?;
    assert!(scheduler.take());
    run_until_idle(&mut renderer, SLICE)?;
    println!("After two clicks:");
    println!("{}", renderer.host().dump_tree(container));

    // Re-render with new props, the way an input field would on each
    // keystroke; the counter keeps its state.
    renderer.render(app("Fibra"), container);
    run_until_idle(&mut renderer, SLICE)?;
    println!("After a props change:");
    println!("{}", renderer.host().dump_tree(container));

    Ok(())
}
