//! In-memory kitchen the binary drives when no real robot is attached.

use std::sync::{Arc, Mutex, MutexGuard};

use robo_core::capability::{CapabilityKind, CapabilityProvider};
use robo_core::error::CapabilityError;
use robo_core::memory::ObjectKnowledge;
use robo_core::memory::objects::{Material, Shape};
use robo_llm::provider::FunctionSchema;
use serde_json::{Map, Value, json};

const MAX_REACH: f64 = 2.0;
const VIEW_RANGE: f64 = 4.0;

#[derive(Debug, Clone)]
struct Item {
    name: &'static str,
    color: &'static str,
    shape: Shape,
    material: Material,
    position: [f64; 3],
    support: Option<String>,
    container: Option<String>,
    contains: Vec<String>,
    fixed: bool,
    is_container: bool,
    cuttable: bool,
}

impl Item {
    fn new(name: &'static str, color: &'static str, shape: Shape, material: Material, position: [f64; 3]) -> Self {
        Self {
            name,
            color,
            shape,
            material,
            position,
            support: None,
            container: None,
            contains: Vec::new(),
            fixed: false,
            is_container: false,
            cuttable: material == Material::Organic,
        }
    }

    fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    fn container(mut self) -> Self {
        self.is_container = true;
        self
    }

    fn knowledge(&self) -> ObjectKnowledge {
        let mut k = ObjectKnowledge::new(self.name);
        k.color = Some(self.color.to_owned());
        k.shape = Some(self.shape);
        k.material = Some(self.material);
        [k.x, k.y, k.z] = self.position.map(Some);
        k.support_surface = self.support.clone();
        k.contains = self.contains.clone();
        k
    }
}

#[derive(Debug)]
pub struct Scene {
    items: Vec<Item>,
    base: [f64; 3],
    gripper: [f64; 3],
    held: Option<String>,
}

impl Scene {
    pub fn kitchen() -> Self {
        use Material::*;
        use Shape::*;

        let mut scene = Self {
            items: vec![
                Item::new("floor", "brown", Cuboidal, Wood, [0.0, 0.0, 0.0]).fixed(),
                Item::new("table", "brown", Cuboidal, Wood, [3.0, 0.0, 0.8]).fixed(),
                Item::new("stove", "black", Cuboidal, Metal, [-3.0, 2.0, 0.9]).fixed(),
                Item::new("sink", "white", Cuboidal, Ceramic, [-3.0, 0.0, 0.9]).fixed(),
                Item::new("fridge", "white", Cuboidal, Metal, [-3.0, -2.0, 1.0]).fixed().container(),
                Item::new("base_cabinet", "brown", Cuboidal, Wood, [0.0, 3.0, 0.5]).fixed().container(),
                Item::new("wall_cabinet", "brown", Cuboidal, Wood, [0.0, 3.0, 1.8]).fixed().container(),
                Item::new("cutting_board", "brown", Cuboidal, Wood, [0.0, 0.0, 0.0]),
                Item::new("knife", "silver", Complex, Metal, [0.0, 0.0, 0.0]),
                Item::new("fork", "silver", Complex, Metal, [0.0, 0.0, 0.0]),
                Item::new("plate", "white", Cylindrical, Ceramic, [0.0, 0.0, 0.0]),
                Item::new("cup", "white", Cylindrical, Ceramic, [0.0, 0.0, 0.0]),
                Item::new("bowl", "white", Cylindrical, Ceramic, [0.0, 0.0, 0.0]),
                Item::new("tomato", "red", Spherical, Organic, [0.0, 0.0, 0.0]),
                Item::new("potato", "brown", Spherical, Organic, [0.0, 0.0, 0.0]),
                Item::new("cucumber", "green", Cylindrical, Organic, [0.0, 0.0, 0.0]),
                Item::new("lettuce", "green", Complex, Organic, [0.0, 0.0, 0.0]),
                Item::new("egg", "white", Spherical, Organic, [0.0, 0.0, 0.0]),
                Item::new("banana", "yellow", Cylindrical, Organic, [0.0, 0.0, 0.0]),
            ],
            base: [0.0, 0.0, 0.0],
            gripper: [0.0, 0.0, 0.0],
            held: None,
        };

        scene.place_on("table", "floor");
        for name in ["cutting_board", "knife", "fork", "tomato", "potato"] {
            scene.place_on(name, "table");
        }
        for name in ["plate", "cup", "bowl"] {
            scene.store_in(name, "base_cabinet");
        }
        for name in ["cucumber", "lettuce", "egg"] {
            scene.store_in(name, "fridge");
        }
        scene.store_in("banana", "wall_cabinet");
        scene
    }

    fn item(&self, name: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.name == name.trim())
    }

    fn item_mut(&mut self, name: &str) -> Option<&mut Item> {
        self.items.iter_mut().find(|i| i.name == name.trim())
    }

    fn place_on(&mut self, name: &str, support: &str) {
        let Some(position) = self.item(support).map(|s| s.position) else { return };
        if let Some(item) = self.item_mut(name) {
            item.position = position;
            item.support = Some(support.to_owned());
            item.container = None;
        }
    }

    fn store_in(&mut self, name: &str, container: &str) {
        self.place_on(name, container);
        if let Some(item) = self.item_mut(name) {
            item.container = Some(container.to_owned());
        }
        if let Some(c) = self.item_mut(container) {
            c.contains.push(name.to_owned());
        }
    }

    /// Knowledge the robot starts with: everything not hidden in a container.
    pub fn seed_knowledge(&self) -> Vec<ObjectKnowledge> {
        self.items.iter().filter(|i| i.container.is_none()).map(Item::knowledge).collect()
    }

    fn reachable(&self, item: &Item) -> bool {
        distance(self.gripper, item.position) <= MAX_REACH
    }

    fn move_to(&mut self, name: &str) -> String {
        let Some(position) = self.item(name).map(|i| i.position) else {
            return format!("Error: I could not find the {name}.");
        };
        self.base = position;
        self.gripper = position;
        format!("I moved to the {name}.")
    }

    fn pick_up(&mut self, name: &str) -> String {
        let Some(item) = self.item(name) else {
            return "Error: Object not found".into();
        };
        if !self.reachable(item) {
            return "Error: Target object is too far away".into();
        }
        if let Some(held) = &self.held {
            return format!("Error: You are currently holding {held}");
        }
        if item.fixed {
            return format!("Error: The {name} is not movable");
        }
        if let Some(container) = &item.container {
            return format!("Error: The {name} is not accessible because its in {container}");
        }
        let position = item.position;
        self.gripper = position;
        self.held = Some(name.to_owned());
        format!("Object {name} picked up")
    }

    fn place(&mut self, name: &str, surface: &str) -> String {
        let Some(target) = self.item(surface) else {
            return "Error: Target location not found".into();
        };
        if !self.reachable(target) {
            return "Error: Target location too far away".into();
        }
        if self.held.as_deref() != Some(name) {
            return "Error: No object held".into();
        }
        self.place_on(name, surface);
        self.held = None;
        format!("Object {name} placed on {surface}")
    }

    fn cut(&mut self, name: &str) -> String {
        let Some(item) = self.item(name) else {
            return "Error: Object not found".into();
        };
        if !self.reachable(item) {
            return "Error: Target object is too far away".into();
        }
        if !item.cuttable {
            return "Error: Object not cuttable".into();
        }
        if self.held.is_none() {
            return "Error: You have nothing to cut with in your hand.".into();
        }
        format!("Object {name} has been cut")
    }

    fn put_in(&mut self, container: &str) -> String {
        let Some(target) = self.item(container) else {
            return "Error: Container not found".into();
        };
        if !self.reachable(target) {
            return "Error: Target container is too far away".into();
        }
        if !target.is_container {
            return format!("Error: {container} is not a container.");
        }
        let Some(held) = self.held.take() else {
            return format!("Error: You are not holding the object you want to place in {container}.");
        };
        self.store_in(&held, container);
        format!("Object {held} has been placed in {container}")
    }

    fn open(&mut self, container: &str) -> String {
        let Some(target) = self.item(container) else {
            return "Error: Container not found".into();
        };
        if !self.reachable(target) {
            return "Error: Target container is too far away".into();
        }
        if !target.is_container {
            return format!("Error: {container} is not a container.");
        }
        let contents = target.contents_line();
        for name in target.contains.clone() {
            if let Some(item) = self.item_mut(&name) {
                item.container = None;
            }
        }
        if let Some(target) = self.item_mut(container) {
            target.contains.clear();
        }
        format!("Container {container} has been opened.{contents}")
    }

    fn look_for(&self, name: &str) -> String {
        let visible = self
            .items
            .iter()
            .filter(|i| i.container.is_none() && distance(self.base, i.position) <= VIEW_RANGE)
            .find(|i| i.name == name.trim());
        match visible {
            Some(item) => format!("I see the {name}. Its on the {}", item.support.as_deref().unwrap_or("floor")),
            None => format!("I don't see the {name} around me."),
        }
    }

    fn search_in(&self, container: &str, name: &str) -> String {
        match self.item(container) {
            Some(c) if c.contains.iter().any(|n| n == name.trim()) => {
                format!("I have found the {name}. Its in the {container}")
            }
            Some(_) => format!("Error: The {name} is not in the {container}."),
            None => "Error: Container not found".into(),
        }
    }
}

impl Item {
    fn contents_line(&self) -> String {
        if self.contains.is_empty() {
            String::new()
        } else {
            format!(" It contains: {}.", self.contains.join(", "))
        }
    }
}

fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

fn text_arg<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a str, CapabilityError> {
    args.get(key).and_then(Value::as_str).ok_or_else(|| CapabilityError::MissingArgument(key.to_owned()))
}

fn schema(name: &str, description: &str, params: &[(&str, &str)]) -> FunctionSchema {
    let properties: Map<String, Value> = params
        .iter()
        .map(|(key, about)| ((*key).to_owned(), json!({"type": "string", "description": about})))
        .collect();
    let required: Vec<&str> = params.iter().map(|(key, _)| *key).collect();
    FunctionSchema::new(name, description, json!({"type": "object", "properties": properties, "required": required}))
}

/// One robot subsystem acting on the shared scene.
pub struct Part {
    kind: CapabilityKind,
    scene: Arc<Mutex<Scene>>,
}

impl Part {
    fn scene(&self) -> Result<MutexGuard<'_, Scene>, CapabilityError> {
        self.scene.lock().map_err(|_| CapabilityError::Failed("scene state is poisoned".into()))
    }
}

/// Navigator, manipulator and vision providers over one shared kitchen.
pub fn robot(scene: Arc<Mutex<Scene>>) -> Vec<Box<dyn CapabilityProvider>> {
    CapabilityKind::ALL
        .iter()
        .map(|&kind| Box::new(Part { kind, scene: scene.clone() }) as Box<dyn CapabilityProvider>)
        .collect()
}

#[async_trait::async_trait]
impl CapabilityProvider for Part {
    fn name(&self) -> &str {
        self.kind.component()
    }

    fn kind(&self) -> CapabilityKind {
        self.kind
    }

    fn function_schemas(&self) -> Vec<FunctionSchema> {
        const OBJECT: (&str, &str) = ("object_name", "The name of the object.");
        const CONTAINER: (&str, &str) = ("container_name", "The name of the container.");
        match self.kind {
            CapabilityKind::Navigation => {
                vec![schema("move_to_object", "Move to a point of interest.", &[("name", "The name of the object to move to.")])]
            }
            CapabilityKind::Manipulation => vec![
                schema("pick_up_object", "Pick up an object. Fails if the object is too heavy or too far away.", &[OBJECT]),
                schema(
                    "place_object",
                    "Place the held object on a support surface. Fails if the surface is too far away.",
                    &[OBJECT, ("support_surface", "The name of the support surface.")],
                ),
                schema("cut_object", "Cut an object using the object held in the gripper.", &[OBJECT]),
                schema("put_object_in_container", "Put the held object in a container.", &[CONTAINER]),
                schema("open_container", "Open a container to make its contents available.", &[CONTAINER]),
            ],
            CapabilityKind::Vision => vec![
                schema("look_around_for_object", "Look around you for an object.", &[OBJECT]),
                schema("search_in_container", "Search in a container for an object.", &[CONTAINER, OBJECT]),
            ],
        }
    }

    fn status(&self) -> String {
        let Ok(scene) = self.scene.lock() else {
            return format!("{}: unavailable", self.name());
        };
        let [x, y, z] = scene.base;
        match self.kind {
            CapabilityKind::Navigation => format!("Base location (x,y,z): ({x},{y},{z})"),
            CapabilityKind::Manipulation => {
                let [gx, gy, gz] = scene.gripper;
                let held = scene.held.as_deref().unwrap_or("nothing");
                format!("End effector location (x,y,z): ({gx},{gy},{gz})\nCurrently holding: {held}")
            }
            CapabilityKind::Vision => format!("Looking around from ({x},{y},{z})"),
        }
    }

    async fn invoke(&self, function: &str, args: &Map<String, Value>) -> Result<String, CapabilityError> {
        let mut scene = self.scene()?;
        let reply = match (self.kind, function) {
            (CapabilityKind::Navigation, "move_to_object") => scene.move_to(text_arg(args, "name")?),
            (CapabilityKind::Manipulation, "pick_up_object") => scene.pick_up(text_arg(args, "object_name")?),
            (CapabilityKind::Manipulation, "place_object") => {
                scene.place(text_arg(args, "object_name")?, text_arg(args, "support_surface")?)
            }
            (CapabilityKind::Manipulation, "cut_object") => scene.cut(text_arg(args, "object_name")?),
            (CapabilityKind::Manipulation, "put_object_in_container") => scene.put_in(text_arg(args, "container_name")?),
            (CapabilityKind::Manipulation, "open_container") => scene.open(text_arg(args, "container_name")?),
            (CapabilityKind::Vision, "look_around_for_object") => scene.look_for(text_arg(args, "object_name")?),
            (CapabilityKind::Vision, "search_in_container") => {
                scene.search_in(text_arg(args, "container_name")?, text_arg(args, "object_name")?)
            }
            _ => return Err(CapabilityError::UnknownFunction(function.to_owned())),
        };
        tracing::debug!(part = self.name(), function, %reply, "playground action");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robo_core::capability::CapabilityRegistry;

    fn args(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), json!(v))).collect()
    }

    fn registry() -> CapabilityRegistry {
        CapabilityRegistry::new(robot(Arc::new(Mutex::new(Scene::kitchen())))).unwrap()
    }

    #[test]
    fn seeded_knowledge_skips_contained_items() {
        let scene = Scene::kitchen();
        let names: Vec<String> = scene.seed_knowledge().into_iter().map(|k| k.name).collect();
        assert!(names.contains(&"tomato".to_owned()));
        assert!(names.contains(&"fridge".to_owned()));
        assert!(!names.contains(&"egg".to_owned()));
    }

    #[tokio::test]
    async fn tomato_is_out_of_reach_until_the_robot_moves() {
        let registry = registry();
        let pick = args(&[("object_name", "tomato")]);
        let far = registry.invoke("pick_up_object", &pick).await.unwrap();
        assert_eq!(far, "Error: Target object is too far away");

        let moved = registry.invoke("move_to_object", &args(&[("name", "table")])).await.unwrap();
        assert_eq!(moved, "I moved to the table.");
        assert_eq!(registry.invoke("pick_up_object", &pick).await.unwrap(), "Object tomato picked up");
    }

    #[tokio::test]
    async fn fridge_contents_need_opening() {
        let registry = registry();
        registry.invoke("move_to_object", &args(&[("name", "fridge")])).await.unwrap();
        let egg = args(&[("object_name", "egg")]);
        let hidden = registry.invoke("pick_up_object", &egg).await.unwrap();
        assert!(hidden.starts_with("Error: The egg is not accessible"));

        let found = registry.invoke("search_in_container", &args(&[("container_name", "fridge"), ("object_name", "egg")])).await;
        assert_eq!(found.unwrap(), "I have found the egg. Its in the fridge");

        let opened = registry.invoke("open_container", &args(&[("container_name", "fridge")])).await.unwrap();
        assert!(opened.starts_with("Container fridge has been opened."));
        assert_eq!(registry.invoke("pick_up_object", &egg).await.unwrap(), "Object egg picked up");
    }

    #[tokio::test]
    async fn fixed_furniture_cannot_be_lifted() {
        let registry = registry();
        registry.invoke("move_to_object", &args(&[("name", "table")])).await.unwrap();
        let reply = registry.invoke("pick_up_object", &args(&[("object_name", "table")])).await.unwrap();
        assert_eq!(reply, "Error: The table is not movable");
    }

    #[tokio::test]
    async fn missing_argument_is_a_fault() {
        let registry = registry();
        let err = registry.invoke("move_to_object", &Map::new()).await.unwrap_err();
        assert!(matches!(err, CapabilityError::MissingArgument(key) if key == "name"));
    }

    #[test]
    fn status_reports_holding_state() {
        let parts = robot(Arc::new(Mutex::new(Scene::kitchen())));
        let arm = parts.iter().find(|p| p.kind() == CapabilityKind::Manipulation).unwrap();
        assert!(arm.status().contains("Currently holding: nothing"));
    }
}
