//! COCO-80 class table and the coarse category grouping used by the
//! detection toggles.

/// Class names in YOLOv8 output order.
pub const NAMES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

const CLASS_PERSON: usize = 0;
const CLASS_CAR: usize = 2;
const CLASS_BUS: usize = 5;
const CLASS_TRUCK: usize = 7;

/// Coarse grouping of classes for the detection toggles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    /// The "person" class
    Person,
    /// Vehicle-like classes: car, truck, bus
    Obstacle,
    /// Everything else
    Object,
}

impl Category {
    /// Map a class id to its category.
    pub fn of(class_id: usize) -> Self {
        match class_id {
            CLASS_PERSON => Category::Person,
            CLASS_CAR | CLASS_BUS | CLASS_TRUCK => Category::Obstacle,
            _ => Category::Object,
        }
    }
}

/// Name for a class id, with a fallback for out-of-range ids.
pub fn name(class_id: usize) -> &'static str {
    NAMES.get(class_id).copied().unwrap_or("object")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        assert_eq!(Category::of(0), Category::Person);
        assert_eq!(Category::of(2), Category::Obstacle); // car
        assert_eq!(Category::of(5), Category::Obstacle); // bus
        assert_eq!(Category::of(7), Category::Obstacle); // truck
        assert_eq!(Category::of(16), Category::Object); // dog
        assert_eq!(Category::of(3), Category::Object); // motorcycle is not gated as obstacle
    }

    #[test]
    fn test_name_fallback() {
        assert_eq!(name(0), "person");
        assert_eq!(name(79), "toothbrush");
        assert_eq!(name(200), "object");
    }
}
