pub(crate) mod coordinate_descent;
