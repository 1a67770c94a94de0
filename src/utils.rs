pub fn partition_iterator<T>(iter: impl Iterator<Item = T>, partitions: usize) -> Vec<Vec<T>> {
    let partitions = partitions.max(1);
    let mut output: Vec<Vec<T>> = (0..partitions).map(|_| Vec::new()).collect();
    for (i, item) in iter.enumerate() {
        let partition_index = i % partitions;
        output[partition_index].push(item);
    }
    output.retain(|partition| !partition.is_empty());
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_round_robin() {
        let partitions = partition_iterator(0..7, 3);
        assert_eq!(partitions, vec![vec![0, 3, 6], vec![1, 4], vec![2, 5]]);
    }

    #[test]
    fn test_partition_drops_empty() {
        let partitions = partition_iterator(0..2, 8);
        assert_eq!(partitions, vec![vec![0], vec![1]]);
    }

    #[test]
    fn test_partition_zero_partitions() {
        let partitions = partition_iterator(0..3, 0);
        assert_eq!(partitions, vec![vec![0, 1, 2]]);
    }
}
