/// Elements with a width (eg. local variable slots, where `long` and `double` take two)
pub trait Width {
    fn width(&self) -> usize;
}
